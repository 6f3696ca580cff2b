//! Corruption shards stored as `.npy` arrays.

use std::path::Path;

use ndarray::Array4;

use crate::dataset::checksum::combine_checksums;
use crate::dataset::npy::read_npy_with_checksum;
use crate::dataset::{ImageDataset, Transform};
use crate::error::{Error, Result};

/// File holding the labels shared by every shard.
pub const LABELS_FILE: &str = "labels.npy";

impl ImageDataset {
    /// Load the shard for `corruption` from `dir`.
    ///
    /// Reads `<dir>/<corruption>.npy`, a `(N, H, W, 3)` `uint8` array, and
    /// `<dir>/labels.npy`, a `(N,)` integer array.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for a missing file, [`Error::Npy`] for a malformed
    /// one and [`Error::ShapeMismatch`] when the image and label counts differ.
    pub fn corrupted(dir: &Path, corruption: &str, transform: Option<Transform>) -> Result<Self> {
        if corruption.is_empty() || corruption.contains(['/', '\\']) || corruption.starts_with('.') {
            return Err(Error::Configuration(format!(
                "invalid corruption name: {corruption:?}"
            )));
        }

        let images_path = dir.join(format!("{corruption}.npy"));
        let labels_path = dir.join(LABELS_FILE);

        let (images, images_sum) = read_npy_with_checksum(&images_path)?;
        let (labels, labels_sum) = read_npy_with_checksum(&labels_path)?;

        let shape = match images.shape[..] {
            [n, h, w, 3] => (n, h, w, 3),
            _ => {
                return Err(Error::Npy {
                    path: images_path,
                    reason: format!("expected (N, H, W, 3) images, found {:?}", images.shape),
                });
            }
        };
        if labels.shape.len() != 1 {
            return Err(Error::Npy {
                path: labels_path,
                reason: format!("expected (N,) labels, found {:?}", labels.shape),
            });
        }

        let labels = labels.to_i64();
        let pixels = images.into_u8().ok_or_else(|| Error::Npy {
            path: images_path.clone(),
            reason: "images must be uint8".to_string(),
        })?;
        let images = Array4::from_shape_vec(shape, pixels).map_err(|e| Error::Npy {
            path: images_path,
            reason: e.to_string(),
        })?;

        let dataset = Self::from_arrays(corruption, images, labels, transform)?;
        Ok(dataset.with_checksum(combine_checksums(&[&images_sum, &labels_sum])))
    }
}
