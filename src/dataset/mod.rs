//! Benchmark datasets: the clean reference set and the corrupted shards.
//!
//! Both are held fully in memory as `(N, H, W, 3)` byte arrays with a parallel
//! label vector, and materialize one [`Sample`] per indexed access.
//!
//! ## Layout on disk
//!
//! ```text
//! <data_root>/
//!   cifar10/test_batch.bin        clean test set (CIFAR-10 binary format)
//!   cifar10-c/labels.npy          labels shared by every corruption shard
//!   cifar10-c/<corruption>.npy    one image shard per corruption
//! ```

pub mod checksum;
pub mod corrupted;
pub mod loader;
pub mod natural;
pub mod npy;
pub mod transform;

use std::path::{Path, PathBuf};

use ndarray::{Array3, Array4, Axis};

use crate::catalog::NATURAL;
use crate::error::{Error, Result};

pub use loader::{Batch, BatchLoader};
pub use transform::{ChannelStats, Transform, TransformStep};

/// One `(image, label)` pair, image as a `(C, H, W)` tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Transformed image.
    pub image: Array3<f32>,
    /// Class id.
    pub label: i64,
}

/// A fixed-length, randomly indexable labeled image collection.
///
/// Implementations are read-only after construction so batch workers can
/// share them.
pub trait LabeledDataset: Send + Sync {
    /// Name of the set (the corruption name, or `natural`).
    fn name(&self) -> &str;

    /// Number of samples.
    fn len(&self) -> usize;

    /// Whether the set has no samples.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialize sample `index`.
    fn get(&self, index: usize) -> Result<Sample>;

    /// Fingerprint of the files the set was loaded from, if any.
    fn checksum(&self) -> Option<&str> {
        None
    }
}

/// In-memory image set backed by a byte array and a label vector.
#[derive(Debug, Clone)]
pub struct ImageDataset {
    name: String,
    images: Array4<u8>,
    labels: Vec<i64>,
    transform: Option<Transform>,
    checksum: Option<String>,
}

impl ImageDataset {
    /// Wrap already-loaded arrays.
    ///
    /// `images` is `(N, H, W, C)`.
    ///
    /// # Errors
    ///
    /// [`Error::ShapeMismatch`] if the image and label counts differ.
    pub fn from_arrays(
        name: impl Into<String>,
        images: Array4<u8>,
        labels: Vec<i64>,
        transform: Option<Transform>,
    ) -> Result<Self> {
        let name = name.into();
        let count = images.len_of(Axis(0));
        if count != labels.len() {
            return Err(Error::ShapeMismatch {
                what: format!("{name} images vs labels"),
                expected: count.to_string(),
                actual: labels.len().to_string(),
            });
        }
        Ok(Self {
            name,
            images,
            labels,
            transform,
            checksum: None,
        })
    }

    /// Attach a source fingerprint.
    #[must_use]
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    /// Per-image `(H, W, C)`.
    #[must_use]
    pub fn image_shape(&self) -> (usize, usize, usize) {
        let (_, h, w, c) = self.images.dim();
        (h, w, c)
    }

    /// All labels, in index order.
    #[must_use]
    pub fn labels(&self) -> &[i64] {
        &self.labels
    }
}

impl LabeledDataset for ImageDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.labels.len()
    }

    fn get(&self, index: usize) -> Result<Sample> {
        let label = *self.labels.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: self.labels.len(),
        })?;
        let raw = self.images.index_axis(Axis(0), index);
        let image = match &self.transform {
            Some(transform) => transform.apply(raw)?,
            None => transform::to_chw(raw),
        };
        Ok(Sample { image, label })
    }

    fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }
}

/// Opens the dataset for a corruption name.
pub trait DatasetSource {
    /// Open the set for `corruption`.
    fn open(&self, corruption: &str) -> Result<Box<dyn LabeledDataset>>;
}

/// The standard on-disk benchmark layout under one data root.
#[derive(Debug, Clone)]
pub struct BenchmarkSource {
    root: PathBuf,
    transform: Option<Transform>,
}

impl BenchmarkSource {
    /// Create a source rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, transform: Option<Transform>) -> Self {
        Self {
            root: root.into(),
            transform,
        }
    }

    /// Data root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the clean test set.
    #[must_use]
    pub fn natural_dir(&self) -> PathBuf {
        self.root.join("cifar10")
    }

    /// Directory holding the corruption shards.
    #[must_use]
    pub fn corrupted_dir(&self) -> PathBuf {
        self.root.join("cifar10-c")
    }
}

impl DatasetSource for BenchmarkSource {
    fn open(&self, corruption: &str) -> Result<Box<dyn LabeledDataset>> {
        let dataset = if corruption == NATURAL {
            ImageDataset::natural(&self.natural_dir(), self.transform.clone())?
        } else {
            ImageDataset::corrupted(&self.corrupted_dir(), corruption, self.transform.clone())?
        };
        Ok(Box::new(dataset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny(n: usize) -> ImageDataset {
        let images = Array4::from_shape_fn((n, 2, 2, 3), |(i, _, _, c)| (i * 10 + c) as u8);
        let labels = (0..n as i64).collect();
        ImageDataset::from_arrays("tiny", images, labels, None).unwrap()
    }

    #[test]
    fn test_len_and_get() {
        let ds = tiny(3);
        assert_eq!(ds.len(), 3);
        assert!(!ds.is_empty());
        assert_eq!(ds.image_shape(), (2, 2, 3));

        for i in 0..3 {
            let sample = ds.get(i).unwrap();
            assert_eq!(sample.label, i as i64);
            assert_eq!(sample.image.shape(), &[3, 2, 2]);
            assert_eq!(sample.image[[2, 0, 0]], (i * 10 + 2) as f32);
        }
    }

    #[test]
    fn test_get_out_of_range() {
        let ds = tiny(2);
        let err = ds.get(2).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { index: 2, len: 2 }));
    }

    #[test]
    fn test_length_mismatch() {
        let images = Array4::<u8>::zeros((3, 2, 2, 3));
        let err = ImageDataset::from_arrays("bad", images, vec![0, 1], None).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_transform_applied() {
        let images = Array4::from_elem((1, 1, 1, 3), 255u8);
        let ds = ImageDataset::from_arrays(
            "white",
            images,
            vec![4],
            Some(Transform::new().then(TransformStep::ToTensor)),
        )
        .unwrap();
        let sample = ds.get(0).unwrap();
        assert!(sample.image.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_source_paths() {
        let source = BenchmarkSource::new("/data", None);
        assert_eq!(source.natural_dir(), PathBuf::from("/data/cifar10"));
        assert_eq!(source.corrupted_dir(), PathBuf::from("/data/cifar10-c"));
    }

    #[test]
    fn test_source_missing_shard() {
        let dir = tempfile::tempdir().unwrap();
        let source = BenchmarkSource::new(dir.path(), None);
        let err = source.open("fog").err().unwrap();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
