//! Frequency-domain input perturbation.
//!
//! A [`FrequencyFilter`] keeps only an annular band of spatial frequencies:
//!
//! 1. [`to_frequency`]: 2D DFT of every channel
//! 2. [`quadrant_shift`]: move the zero frequency to the center
//! 3. multiply by [`build_ring_mask`]
//! 4. [`quadrant_shift`] back, [`from_frequency`], keep the [`real_part`]
//!
//! [`InputStage`] plugs the filter into evaluation as an optional stage that
//! runs on each batch before inference. The default stage is
//! [`InputStage::Identity`].

mod fft;
mod mask;

use std::sync::OnceLock;

use ndarray::{Array4, Array5, ArrayView4, Axis};
use serde::{Deserialize, Serialize};

use crate::dataset::ChannelStats;
use crate::error::{Error, Result};

pub use fft::{from_frequency, real_part, to_frequency};
pub use mask::{build_ring_mask, quadrant_shift};

/// Band-pass filter in the centered frequency plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyFilter {
    inner: f64,
    outer: f64,
    #[serde(skip)]
    mask: OnceLock<Array5<f32>>,
}

impl FrequencyFilter {
    /// Keep frequencies with `inner < radius <= outer`.
    ///
    /// See [`build_ring_mask`] for how non-positive radii behave.
    #[must_use]
    pub fn new(inner: f64, outer: f64) -> Self {
        Self {
            inner,
            outer,
            mask: OnceLock::new(),
        }
    }

    /// Inner radius.
    #[must_use]
    pub fn inner(&self) -> f64 {
        self.inner
    }

    /// Outer radius.
    #[must_use]
    pub fn outer(&self) -> f64 {
        self.outer
    }

    /// Filter a `(B, C, N, N)` batch.
    ///
    /// # Errors
    ///
    /// [`Error::Shape`] unless the planes are square with an even side.
    pub fn apply(&self, batch: ArrayView4<'_, f32>) -> Result<Array4<f32>> {
        let (_, _, h, w) = batch.dim();
        let z = quadrant_shift(to_frequency(batch).view())?;

        // The mask is built once for the first plane size seen and broadcast
        // over batch and channel axes.
        let cached = match self.mask.get() {
            Some(mask) => Some(mask),
            None => {
                let mask = build_ring_mask([1, 1, h, w, 2], self.inner, self.outer)?;
                let _ = self.mask.set(mask);
                self.mask.get()
            }
        };
        let fresh;
        let mask = match cached {
            Some(mask) if mask.dim().2 == h && mask.dim().3 == w => mask,
            _ => {
                fresh = build_ring_mask([1, 1, h, w, 2], self.inner, self.outer)?;
                &fresh
            }
        };

        let z = &z * mask;
        let z = quadrant_shift(z.view())?;
        real_part(from_frequency(z.view())?.view())
    }
}

impl PartialEq for FrequencyFilter {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner && self.outer == other.outer
    }
}

/// Rescale every image of a `(B, C, H, W)` batch to `[0, 1]`.
///
/// Minimum and maximum are taken over all channels of an image. A constant
/// image becomes all zeros.
pub fn batch_standardize(batch: &mut Array4<f32>) {
    for mut image in batch.outer_iter_mut() {
        let min = image.iter().copied().fold(f32::INFINITY, f32::min);
        let max = image.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let range = max - min;
        if range > 0.0 {
            image.mapv_inplace(|v| (v - min) / range);
        } else {
            image.fill(0.0);
        }
    }
}

/// Per-channel `(x - mean) / std` over a `(B, 3, H, W)` batch.
///
/// # Errors
///
/// [`Error::ShapeMismatch`] if the batch does not have 3 channels.
pub fn normalize(batch: &mut Array4<f32>, stats: &ChannelStats) -> Result<()> {
    let channels = batch.len_of(Axis(1));
    if channels != 3 {
        return Err(Error::ShapeMismatch {
            what: "normalize channels".to_string(),
            expected: "3".to_string(),
            actual: channels.to_string(),
        });
    }
    for (c, mut plane) in batch.axis_iter_mut(Axis(1)).enumerate() {
        let (mean, std) = (stats.mean[c], stats.std[c]);
        plane.mapv_inplace(|v| (v - mean) / std);
    }
    Ok(())
}

/// Optional batch preprocessing applied right before inference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum InputStage {
    /// Pass batches through unchanged.
    #[default]
    Identity,
    /// Band-pass filter, then min-max rescale, then normalize with `stats`.
    BandPass {
        /// Frequency band to keep.
        filter: FrequencyFilter,
        /// Normalization applied after rescaling.
        stats: ChannelStats,
    },
}

impl InputStage {
    /// Band-pass stage with the given radii.
    #[must_use]
    pub fn band_pass(inner: f64, outer: f64, stats: ChannelStats) -> Self {
        Self::BandPass {
            filter: FrequencyFilter::new(inner, outer),
            stats,
        }
    }

    /// Run the stage on one batch.
    pub fn apply(&self, batch: Array4<f32>) -> Result<Array4<f32>> {
        match self {
            Self::Identity => Ok(batch),
            Self::BandPass { filter, stats } => {
                let mut x = filter.apply(batch.view())?;
                batch_standardize(&mut x);
                normalize(&mut x, stats)?;
                Ok(x)
            }
        }
    }

    /// Short description for reports.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Identity => "identity".to_string(),
            Self::BandPass { filter, .. } => {
                format!("band-pass(inner={}, outer={})", filter.inner(), filter.outer())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> Array4<f32> {
        Array4::from_shape_fn((2, 3, 8, 8), |(b, c, y, x)| {
            ((b * 13 + c * 7 + y * 3 + x * 5) % 11) as f32 / 10.0
        })
    }

    #[test]
    fn test_all_pass_filter_reconstructs() {
        let x = batch();
        let out = FrequencyFilter::new(0.0, 0.0).apply(x.view()).unwrap();
        for (a, b) in x.iter().zip(out.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_dc_only_filter_gives_channel_means() {
        let x = batch();
        let out = FrequencyFilter::new(0.0, 0.5).apply(x.view()).unwrap();
        for b in 0..2 {
            for c in 0..3 {
                let plane = x.index_axis(Axis(0), b);
                let plane = plane.index_axis(Axis(0), c);
                let mean = plane.sum() / 64.0;
                let filtered = out.index_axis(Axis(0), b);
                let filtered = filtered.index_axis(Axis(0), c);
                assert!(filtered.iter().all(|&v| (v - mean).abs() < 1e-4));
            }
        }
    }

    #[test]
    fn test_filter_reused_for_new_size() {
        let filter = FrequencyFilter::new(0.0, 0.0);
        filter.apply(batch().view()).unwrap();
        let small = Array4::<f32>::from_elem((1, 3, 4, 4), 0.5);
        let out = filter.apply(small.view()).unwrap();
        assert_eq!(out.dim(), (1, 3, 4, 4));
        assert!(out.iter().all(|&v| (v - 0.5).abs() < 1e-5));
    }

    #[test]
    fn test_filter_rejects_odd_planes() {
        let x = Array4::<f32>::zeros((1, 3, 5, 5));
        assert!(FrequencyFilter::new(0.0, 2.0).apply(x.view()).is_err());
    }

    #[test]
    fn test_batch_standardize() {
        let mut x = batch();
        x.index_axis_mut(Axis(0), 1).fill(3.0);
        batch_standardize(&mut x);
        let first = x.index_axis(Axis(0), 0);
        assert_eq!(first.iter().copied().fold(f32::INFINITY, f32::min), 0.0);
        assert_eq!(first.iter().copied().fold(f32::NEG_INFINITY, f32::max), 1.0);
        assert!(x.index_axis(Axis(0), 1).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_normalize_channels() {
        let mut x = Array4::<f32>::ones((1, 3, 2, 2));
        let stats = ChannelStats {
            mean: [0.5, 0.0, 1.0],
            std: [0.5, 2.0, 1.0],
        };
        normalize(&mut x, &stats).unwrap();
        assert_eq!(x[[0, 0, 1, 1]], 1.0);
        assert_eq!(x[[0, 1, 0, 0]], 0.5);
        assert_eq!(x[[0, 2, 0, 1]], 0.0);

        let mut gray = Array4::<f32>::ones((1, 1, 2, 2));
        assert!(normalize(&mut gray, &stats).is_err());
    }

    #[test]
    fn test_identity_stage() {
        let x = batch();
        assert_eq!(InputStage::Identity.apply(x.clone()).unwrap(), x);
        assert_eq!(InputStage::default().describe(), "identity");
    }

    #[test]
    fn test_band_pass_stage_output_is_normalized() {
        let stage = InputStage::band_pass(1.0, 3.0, ChannelStats::CIFAR10);
        let out = stage.apply(batch()).unwrap();
        assert_eq!(out.dim(), (2, 3, 8, 8));
        // Every channel value lies in the normalized image of [0, 1].
        for c in 0..3 {
            let lo = -ChannelStats::CIFAR10.mean[c] / ChannelStats::CIFAR10.std[c];
            let hi = (1.0 - ChannelStats::CIFAR10.mean[c]) / ChannelStats::CIFAR10.std[c];
            let plane = out.index_axis(Axis(1), c);
            assert!(plane.iter().all(|&v| v >= lo - 1e-4 && v <= hi + 1e-4));
        }
        assert!(stage.describe().starts_with("band-pass"));
    }
}
