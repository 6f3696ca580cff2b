//! The clean CIFAR-10 test set in its binary distribution format.
//!
//! The files can be downloaded from <https://www.cs.toronto.edu/~kriz/cifar.html>
//! (binary version). Each record is one label byte followed by a 32x32 image
//! stored as three channel planes.

use std::path::Path;

use ndarray::Array4;

use crate::catalog::NATURAL;
use crate::dataset::checksum::compute_checksum_bytes;
use crate::dataset::{ImageDataset, Transform};
use crate::error::{Error, Result};

/// Test batch file name inside the CIFAR-10 directory.
pub const TEST_BATCH_FILE: &str = "test_batch.bin";

const W: usize = 32;
const H: usize = 32;
const C: usize = 3;
const BYTES_PER_IMAGE: usize = W * H * C + 1;

impl ImageDataset {
    /// Load `<dir>/test_batch.bin` as the `natural` reference set.
    ///
    /// Images are stored `(N, H, W, 3)` like the corruption shards so the same
    /// transform applies to both.
    pub fn natural(dir: &Path, transform: Option<Transform>) -> Result<Self> {
        let path = dir.join(TEST_BATCH_FILE);
        let data = std::fs::read(&path).map_err(|e| Error::from_io(&path, e))?;
        if data.len() % BYTES_PER_IMAGE != 0 {
            return Err(Error::ShapeMismatch {
                what: format!("CIFAR-10 records in {}", path.display()),
                expected: format!("a multiple of {BYTES_PER_IMAGE} bytes"),
                actual: data.len().to_string(),
            });
        }

        let (images, labels) = decode_records(&data);
        let checksum = compute_checksum_bytes(&data);
        Ok(Self::from_arrays(NATURAL, images, labels, transform)?.with_checksum(checksum))
    }
}

fn decode_records(data: &[u8]) -> (Array4<u8>, Vec<i64>) {
    let count = data.len() / BYTES_PER_IMAGE;
    let labels = data
        .chunks_exact(BYTES_PER_IMAGE)
        .map(|record| i64::from(record[0]))
        .collect();
    let images = Array4::from_shape_fn((count, H, W, C), |(n, y, x, c)| {
        data[n * BYTES_PER_IMAGE + 1 + c * H * W + y * W + x]
    });
    (images, labels)
}

/// Encode `(image, label)` records in the CIFAR-10 binary layout.
///
/// `images` is `(N, 32, 32, 3)`; mainly useful for building small fixtures.
pub fn encode_records(images: &Array4<u8>, labels: &[u8]) -> Result<Vec<u8>> {
    let (count, h, w, c) = images.dim();
    if (h, w, c) != (H, W, C) || count != labels.len() {
        return Err(Error::ShapeMismatch {
            what: "CIFAR-10 records".to_string(),
            expected: format!("({}, {H}, {W}, {C})", labels.len()),
            actual: format!("{:?}", images.dim()),
        });
    }
    let mut out = Vec::with_capacity(count * BYTES_PER_IMAGE);
    for (n, &label) in labels.iter().enumerate() {
        out.push(label);
        for ch in 0..C {
            for y in 0..H {
                for x in 0..W {
                    out.push(images[[n, y, x, ch]]);
                }
            }
        }
    }
    Ok(out)
}
