//! Batched 2D discrete Fourier transforms.
//!
//! Complex planes are stored as real arrays with a trailing axis of length 2
//! holding `(re, im)`, so `(B, C, H, W)` images become `(B, C, H, W, 2)`.

use ndarray::{Array4, Array5, ArrayView4, ArrayView5, Axis};
use num_complex::Complex64;
use rustfft::FftPlanner;

use crate::error::{Error, Result};

/// Forward 2D DFT of every channel of every image. Unnormalized.
#[must_use]
pub fn to_frequency(batch: ArrayView4<'_, f32>) -> Array5<f32> {
    let (b, c, h, w) = batch.dim();
    let mut z = Array5::<f32>::zeros((b, c, h, w, 2));
    z.index_axis_mut(Axis(4), 0).assign(&batch);
    transform_planes(z.view(), false)
}

/// Inverse 2D DFT, scaled by `1 / (H * W)`.
///
/// # Errors
///
/// [`Error::Shape`] if the last axis is not `(re, im)`.
pub fn from_frequency(freq: ArrayView5<'_, f32>) -> Result<Array5<f32>> {
    check_complex(freq.dim())?;
    Ok(transform_planes(freq, true))
}

/// Real component of a complex batch, `(B, C, H, W)`.
///
/// # Errors
///
/// [`Error::Shape`] if the last axis is not `(re, im)`.
pub fn real_part(freq: ArrayView5<'_, f32>) -> Result<Array4<f32>> {
    check_complex(freq.dim())?;
    Ok(freq.index_axis(Axis(4), 0).to_owned())
}

pub(crate) fn check_complex(dim: (usize, usize, usize, usize, usize)) -> Result<()> {
    if dim.4 != 2 {
        return Err(Error::Shape(format!(
            "expected a trailing (re, im) axis of length 2, got {}",
            dim.4
        )));
    }
    Ok(())
}

fn transform_planes(z: ArrayView5<'_, f32>, inverse: bool) -> Array5<f32> {
    let (b, c, h, w, _) = z.dim();
    let mut out = Array5::<f32>::zeros((b, c, h, w, 2));
    if h == 0 || w == 0 {
        return out;
    }

    let mut planner = FftPlanner::<f64>::new();
    let (row_fft, col_fft) = if inverse {
        (planner.plan_fft_inverse(w), planner.plan_fft_inverse(h))
    } else {
        (planner.plan_fft_forward(w), planner.plan_fft_forward(h))
    };
    let scale = if inverse { 1.0 / (h * w) as f64 } else { 1.0 };

    let mut plane = vec![Complex64::default(); h * w];
    let mut column = vec![Complex64::default(); h];

    for bi in 0..b {
        for ci in 0..c {
            for y in 0..h {
                for x in 0..w {
                    plane[y * w + x] = Complex64::new(
                        f64::from(z[[bi, ci, y, x, 0]]),
                        f64::from(z[[bi, ci, y, x, 1]]),
                    );
                }
            }

            for row in plane.chunks_exact_mut(w) {
                row_fft.process(row);
            }
            for x in 0..w {
                for y in 0..h {
                    column[y] = plane[y * w + x];
                }
                col_fft.process(&mut column);
                for y in 0..h {
                    plane[y * w + x] = column[y];
                }
            }

            for y in 0..h {
                for x in 0..w {
                    let v = plane[y * w + x] * scale;
                    out[[bi, ci, y, x, 0]] = v.re as f32;
                    out[[bi, ci, y, x, 1]] = v.im as f32;
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_image_has_only_dc() {
        let batch = Array4::<f32>::from_elem((1, 1, 4, 4), 2.0);
        let z = to_frequency(batch.view());
        assert_eq!(z.dim(), (1, 1, 4, 4, 2));
        assert!((z[[0, 0, 0, 0, 0]] - 32.0).abs() < 1e-5);
        for y in 0..4 {
            for x in 0..4 {
                if (y, x) != (0, 0) {
                    assert!(z[[0, 0, y, x, 0]].abs() < 1e-5);
                    assert!(z[[0, 0, y, x, 1]].abs() < 1e-5);
                }
            }
        }
    }

    #[test]
    fn test_inverse_recovers_input() {
        let batch = Array4::from_shape_fn((2, 3, 8, 8), |(b, c, y, x)| {
            ((b * 31 + c * 17 + y * 5 + x * 3) % 23) as f32 / 7.0 - 1.0
        });
        let z = to_frequency(batch.view());
        let back = real_part(from_frequency(z.view()).unwrap().view()).unwrap();
        for (a, b) in batch.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-4, "{a} vs {b}");
        }
    }

    #[test]
    fn test_single_frequency() {
        // cos(2*pi*x/4) along the width puts energy at columns 1 and 3.
        let batch = Array4::from_shape_fn((1, 1, 4, 4), |(_, _, _, x)| {
            (std::f32::consts::PI * x as f32 / 2.0).cos()
        });
        let z = to_frequency(batch.view());
        assert!((z[[0, 0, 0, 1, 0]] - 8.0).abs() < 1e-4);
        assert!((z[[0, 0, 0, 3, 0]] - 8.0).abs() < 1e-4);
        assert!(z[[0, 0, 1, 1, 0]].abs() < 1e-4);
    }

    #[test]
    fn test_rejects_non_complex_layout() {
        let z = Array5::<f32>::zeros((1, 1, 2, 2, 3));
        assert!(matches!(from_frequency(z.view()), Err(Error::Shape(_))));
        assert!(matches!(real_part(z.view()), Err(Error::Shape(_))));
    }
}
