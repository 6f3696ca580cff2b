//! Per-sample transform pipeline.
//!
//! Samples are stored as `(H, W, 3)` bytes. A [`Transform`] turns one into a
//! `(3, H, W)` float tensor: the layout change always happens, the listed
//! steps then run in order.

use ndarray::{Array3, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Per-channel normalization constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    /// Channel means, subtracted first.
    pub mean: [f32; 3],
    /// Channel standard deviations, divided second.
    pub std: [f32; 3],
}

impl ChannelStats {
    /// CIFAR-10 training-set statistics.
    pub const CIFAR10: Self = Self {
        mean: [0.49139968, 0.48215841, 0.44653091],
        std: [0.24703223, 0.24348513, 0.26158784],
    };
}

impl Default for ChannelStats {
    fn default() -> Self {
        Self::CIFAR10
    }
}

/// One step of a [`Transform`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TransformStep {
    /// Scale byte values into `[0, 1]`.
    ToTensor,
    /// Min-max rescale the whole image into `[0, 1]`.
    Standardize,
    /// Subtract the channel mean and divide by the channel std.
    Normalize(ChannelStats),
}

/// Ordered list of [`TransformStep`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    steps: Vec<TransformStep>,
}

impl Transform {
    /// An empty pipeline: layout conversion only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard evaluation pipeline: `ToTensor` then `Normalize`.
    #[must_use]
    pub fn standard(stats: ChannelStats) -> Self {
        Self::new()
            .then(TransformStep::ToTensor)
            .then(TransformStep::Normalize(stats))
    }

    /// Append a step.
    #[must_use]
    pub fn then(mut self, step: TransformStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Steps in application order.
    #[must_use]
    pub fn steps(&self) -> &[TransformStep] {
        &self.steps
    }

    /// Apply the pipeline to one `(H, W, C)` image.
    pub fn apply(&self, image: ArrayView3<'_, u8>) -> Result<Array3<f32>> {
        let mut x = to_chw(image);
        for step in &self.steps {
            match step {
                TransformStep::ToTensor => x.mapv_inplace(|v| v / 255.0),
                TransformStep::Standardize => standardize(&mut x),
                TransformStep::Normalize(stats) => normalize(&mut x, stats)?,
            }
        }
        Ok(x)
    }
}

/// Convert `(H, W, C)` bytes to a `(C, H, W)` float tensor without rescaling.
#[must_use]
pub fn to_chw(image: ArrayView3<'_, u8>) -> Array3<f32> {
    image
        .permuted_axes([2, 0, 1])
        .as_standard_layout()
        .mapv(f32::from)
}

fn standardize(x: &mut Array3<f32>) {
    let min = x.iter().copied().fold(f32::INFINITY, f32::min);
    let max = x.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    if range > 0.0 {
        x.mapv_inplace(|v| (v - min) / range);
    } else {
        x.fill(0.0);
    }
}

fn normalize(x: &mut Array3<f32>, stats: &ChannelStats) -> Result<()> {
    if x.len_of(Axis(0)) != 3 {
        return Err(Error::ShapeMismatch {
            what: "normalize channels".to_string(),
            expected: "3".to_string(),
            actual: x.len_of(Axis(0)).to_string(),
        });
    }
    for (c, mut channel) in x.outer_iter_mut().enumerate() {
        let (mean, std) = (stats.mean[c], stats.std[c]);
        channel.mapv_inplace(|v| (v - mean) / std);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn solid(h: usize, w: usize, rgb: [u8; 3]) -> Array3<u8> {
        Array3::from_shape_fn((h, w, 3), |(_, _, c)| rgb[c])
    }

    #[test]
    fn test_layout_only() {
        let img = Array3::from_shape_fn((2, 2, 3), |(y, x, c)| (y * 100 + x * 10 + c) as u8);
        let out = Transform::new().apply(img.view()).unwrap();
        assert_eq!(out.shape(), &[3, 2, 2]);
        assert_eq!(out[[2, 1, 0]], 102.0);
        assert_eq!(out[[0, 0, 1]], 10.0);
    }

    #[test]
    fn test_to_tensor_scales() {
        let img = solid(2, 2, [255, 0, 51]);
        let out = Transform::new()
            .then(TransformStep::ToTensor)
            .apply(img.view())
            .unwrap();
        assert!((out[[0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!(out[[1, 1, 1]].abs() < 1e-6);
        assert!((out[[2, 0, 1]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_standard_pipeline() {
        let img = solid(1, 1, [255, 255, 255]);
        let out = Transform::standard(ChannelStats::CIFAR10)
            .apply(img.view())
            .unwrap();
        for c in 0..3 {
            let expected = (1.0 - ChannelStats::CIFAR10.mean[c]) / ChannelStats::CIFAR10.std[c];
            assert!((out[[c, 0, 0]] - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn test_standardize_flat_image() {
        let img = solid(2, 2, [7, 7, 7]);
        let out = Transform::new()
            .then(TransformStep::Standardize)
            .apply(img.view())
            .unwrap();
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_standardize_range() {
        let img = Array3::from_shape_fn((2, 2, 3), |(y, x, _)| (y * 2 + x) as u8 * 10);
        let out = Transform::new()
            .then(TransformStep::Standardize)
            .apply(img.view())
            .unwrap();
        assert_eq!(out[[0, 0, 0]], 0.0);
        assert_eq!(out[[1, 1, 1]], 1.0);
    }

    #[test]
    fn test_normalize_rejects_wrong_channels() {
        let img = Array3::<u8>::zeros((2, 2, 4));
        let result = Transform::standard(ChannelStats::CIFAR10).apply(img.view());
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }
}
