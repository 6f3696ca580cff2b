//! Quadrant shift and annular frequency masks.

use ndarray::{Array5, ArrayView5, s};

use crate::error::{Error, Result};
use crate::frequency::fft::check_complex;

/// Swap opposite quadrants so the zero frequency sits at `(H/2, W/2)`.
///
/// Top-left trades places with bottom-right, top-right with bottom-left.
/// Applying it twice restores the input.
///
/// # Errors
///
/// [`Error::Shape`] unless the input is `(B, C, N, N, 2)` with `N` even.
pub fn quadrant_shift(z: ArrayView5<'_, f32>) -> Result<Array5<f32>> {
    let (_, _, h, w, f) = z.dim();
    check_complex((0, 0, 0, 0, f))?;
    if h != w || h % 2 != 0 {
        return Err(Error::Shape(format!(
            "quadrant shift needs an even square plane, got {h}x{w}"
        )));
    }

    let half = h / 2;
    let mut out = Array5::<f32>::zeros(z.raw_dim());
    out.slice_mut(s![.., .., ..half, ..half, ..])
        .assign(&z.slice(s![.., .., half.., half.., ..]));
    out.slice_mut(s![.., .., ..half, half.., ..])
        .assign(&z.slice(s![.., .., half.., ..half, ..]));
    out.slice_mut(s![.., .., half.., ..half, ..])
        .assign(&z.slice(s![.., .., ..half, half.., ..]));
    out.slice_mut(s![.., .., half.., half.., ..])
        .assign(&z.slice(s![.., .., ..half, ..half, ..]));
    Ok(out)
}

/// Binary mask keeping the annulus between `inner` and `outer` radius.
///
/// `shape` is `(B, C, H, W, F)`; use `B = C = 1` to broadcast over a batch.
/// Pixel `(r, c)` lies in a disk of radius `R` centered at `(H/2, W/2)` when
/// `(r - H/2)^2 + (c - W/2)^2 <= R^2`. The mask is 1 inside the outer disk and
/// outside the inner one. `outer <= 0` makes the outer disk the whole plane;
/// `inner <= 0` removes nothing.
///
/// # Errors
///
/// [`Error::Shape`] if `H != W`.
pub fn build_ring_mask(shape: [usize; 5], inner: f64, outer: f64) -> Result<Array5<f32>> {
    let [b, c, h, w, f] = shape;
    if h != w {
        return Err(Error::Shape(format!(
            "ring mask needs a square plane, got {h}x{w}"
        )));
    }

    let center = (h / 2) as f64;
    let in_disk = |r: usize, col: usize, radius: f64| {
        let dy = r as f64 - center;
        let dx = col as f64 - center;
        dy * dy + dx * dx <= radius * radius
    };

    Ok(Array5::from_shape_fn((b, c, h, w, f), |(_, _, r, col, _)| {
        let kept = (outer <= 0.0 || in_disk(r, col, outer)) && !(inner > 0.0 && in_disk(r, col, inner));
        if kept { 1.0 } else { 0.0 }
    }))
}
