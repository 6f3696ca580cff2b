//! Accuracy statistics and summary charts.
//!
//! ## Core Statistics
//!
//! - [`AverageMeter`]: running mean of per-batch values
//! - [`top_k_accuracy`]: top-k accuracy from logits and labels
//! - [`cross_entropy`]: mean cross-entropy loss
//! - [`mean`]: arithmetic mean
//!
//! ## Charts
//!
//! - [`chart`]: SVG bar chart
//! - [`raster`]: PNG bar chart

mod accuracy;
pub mod chart;
pub mod raster;

pub use accuracy::{cross_entropy, top_k_accuracy};
pub use chart::{BarChartConfig, generate_bar_svg};
pub use raster::render_bar_png;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Running average of values fed one update at a time.
///
/// Every update carries weight 1, so the average is over updates (batches),
/// not over samples.
///
/// # Example
///
/// ```
/// use corruption_bench::stats::AverageMeter;
///
/// let mut meter = AverageMeter::new();
/// assert!(meter.average().is_err());
///
/// meter.update(50.0);
/// meter.update(100.0);
/// assert_eq!(meter.average().unwrap(), 75.0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AverageMeter {
    sum: f64,
    count: usize,
}

impl AverageMeter {
    /// An empty meter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one value.
    pub fn update(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    /// Number of updates so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Sum of all values.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Mean of all values.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyAverage`] before the first update.
    pub fn average(&self) -> Result<f64> {
        if self.count == 0 {
            return Err(Error::EmptyAverage);
        }
        Ok(self.sum / self.count as f64)
    }
}

/// Compute arithmetic mean.
///
/// Returns `None` for an empty slice.
///
/// # Example
///
/// ```
/// use corruption_bench::stats::mean;
///
/// assert!((mean(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap() - 3.0).abs() < 0.001);
/// assert!(mean(&[]).is_none());
/// ```
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_average_is_mean_of_updates() {
        let values = [12.5, 80.0, 33.0, 0.0, 99.5];
        let mut meter = AverageMeter::new();
        for v in values {
            meter.update(v);
        }
        assert_eq!(meter.count(), 5);
        let expected = values.iter().sum::<f64>() / 5.0;
        assert!((meter.average().unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_meter_empty_fails() {
        let meter = AverageMeter::new();
        assert!(matches!(meter.average(), Err(Error::EmptyAverage)));
        assert_eq!(meter.sum(), 0.0);
    }

    #[test]
    fn test_meter_single_update() {
        let mut meter = AverageMeter::new();
        meter.update(42.0);
        assert_eq!(meter.average().unwrap(), 42.0);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[2.0, 4.0]), Some(3.0));
        assert_eq!(mean(&[]), None);
    }
}
