//! Sequential batching over a [`LabeledDataset`].
//!
//! Batches come out in index order and are never shuffled, so metrics are
//! reproducible. Samples inside a batch are materialized on a rayon pool and
//! collected back in order.

use ndarray::{Array4, ArrayView3, Axis};
use rayon::prelude::*;

use crate::dataset::{LabeledDataset, Sample};
use crate::error::{Error, Result};

/// A stacked batch.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Images, `(B, C, H, W)`.
    pub images: Array4<f32>,
    /// Class ids, one per image.
    pub labels: Vec<i64>,
}

impl Batch {
    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Stack samples along a new leading axis.
    pub fn stack(samples: Vec<Sample>) -> Result<Self> {
        let views: Vec<ArrayView3<'_, f32>> = samples.iter().map(|s| s.image.view()).collect();
        let images = ndarray::stack(Axis(0), &views).map_err(|e| Error::ShapeMismatch {
            what: "batch images".to_string(),
            expected: "identical sample shapes".to_string(),
            actual: e.to_string(),
        })?;
        let labels = samples.iter().map(|s| s.label).collect();
        Ok(Self { images, labels })
    }
}

/// Iterator over fixed-size batches of a dataset.
pub struct BatchLoader<'a> {
    dataset: &'a dyn LabeledDataset,
    batch_size: usize,
    pool: &'a rayon::ThreadPool,
    next: usize,
}

impl<'a> BatchLoader<'a> {
    /// Create a loader. The last batch may be shorter than `batch_size`.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if `batch_size` is zero.
    pub fn new(
        dataset: &'a dyn LabeledDataset,
        batch_size: usize,
        pool: &'a rayon::ThreadPool,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::Configuration("batch size must be at least 1".to_string()));
        }
        Ok(Self {
            dataset,
            batch_size,
            pool,
            next: 0,
        })
    }

    /// Total number of batches.
    #[must_use]
    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    fn load(&self, start: usize, end: usize) -> Result<Batch> {
        let dataset = self.dataset;
        let samples = self.pool.install(|| {
            (start..end)
                .into_par_iter()
                .map(|index| dataset.get(index))
                .collect::<Result<Vec<_>>>()
        })?;
        Batch::stack(samples)
    }
}

impl Iterator for BatchLoader<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.dataset.len();
        if self.next >= len {
            return None;
        }
        let start = self.next;
        let end = (start + self.batch_size).min(len);
        self.next = end;
        Some(self.load(start, end))
    }
}

/// Build a pool for batch workers. `0` lets rayon pick the thread count.
pub fn worker_pool(workers: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("batch-worker-{i}"))
        .build()
        .map_err(|e| Error::Configuration(format!("cannot start batch workers: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ImageDataset;

    fn dataset(n: usize) -> ImageDataset {
        let images = Array4::from_shape_fn((n, 2, 2, 3), |(i, _, _, _)| i as u8);
        ImageDataset::from_arrays("seq", images, (0..n as i64).collect(), None).unwrap()
    }

    #[test]
    fn test_batches_in_order() {
        let ds = dataset(10);
        let pool = worker_pool(4).unwrap();
        let loader = BatchLoader::new(&ds, 4, &pool).unwrap();
        assert_eq!(loader.num_batches(), 3);

        let batches: Vec<Batch> = loader.collect::<Result<_>>().unwrap();
        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![4, 4, 2]);

        let labels: Vec<i64> = batches.iter().flat_map(|b| b.labels.clone()).collect();
        assert_eq!(labels, (0..10).collect::<Vec<_>>());

        assert_eq!(batches[1].images.shape(), &[4, 3, 2, 2]);
        assert_eq!(batches[1].images[[2, 0, 1, 1]], 6.0);
    }

    #[test]
    fn test_deterministic_across_runs() {
        let ds = dataset(9);
        let pool = worker_pool(3).unwrap();
        let first: Vec<Vec<i64>> = BatchLoader::new(&ds, 2, &pool)
            .unwrap()
            .map(|b| b.unwrap().labels)
            .collect();
        let second: Vec<Vec<i64>> = BatchLoader::new(&ds, 2, &pool)
            .unwrap()
            .map(|b| b.unwrap().labels)
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_batch_size() {
        let ds = dataset(1);
        let pool = worker_pool(1).unwrap();
        assert!(matches!(
            BatchLoader::new(&ds, 0, &pool),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_empty_dataset() {
        let ds = dataset(0);
        let pool = worker_pool(1).unwrap();
        let mut loader = BatchLoader::new(&ds, 8, &pool).unwrap();
        assert_eq!(loader.num_batches(), 0);
        assert!(loader.next().is_none());
    }
}
