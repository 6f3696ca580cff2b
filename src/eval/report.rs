//! Report types for benchmark results.
//!
//! A [`ResultsTable`] maps corruption names to top-1 accuracy in evaluation
//! order; [`BenchmarkReport`] wraps it with the per-corruption details and is
//! what gets written to JSON and CSV.

use std::fmt::Write as _;
use std::time::Duration;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};
use crate::stats::{BarChartConfig, mean};

/// Key of the synthetic overall-average entry.
pub const AVG_KEY: &str = "avg";

/// Corruption name to accuracy (percent), in insertion order.
///
/// Serializes as a JSON object whose keys keep that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsTable {
    entries: Vec<(String, f64)>,
}

impl ResultsTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `accuracy` for `name`.
    ///
    /// A name seen before keeps its position and takes the new value.
    pub fn insert(&mut self, name: impl Into<String>, accuracy: f64) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = accuracy,
            None => self.entries.push((name, accuracy)),
        }
    }

    /// Accuracy recorded for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    /// Entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    /// Number of entries, `avg` included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `avg` entry, once finalized.
    #[must_use]
    pub fn average(&self) -> Option<f64> {
        self.get(AVG_KEY)
    }

    /// Append `avg`, the mean of every other entry.
    ///
    /// Earlier entries are left untouched. Finalizing twice recomputes the
    /// same value.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyAverage`] if there is nothing to average.
    ///
    /// # Example
    ///
    /// ```
    /// use corruption_bench::eval::ResultsTable;
    ///
    /// let mut table = ResultsTable::new();
    /// table.insert("natural", 90.0);
    /// table.insert("fog", 70.0);
    /// let table = table.finalize().unwrap();
    /// assert_eq!(table.average(), Some(80.0));
    /// ```
    pub fn finalize(mut self) -> Result<Self> {
        let values: Vec<f64> = self
            .entries
            .iter()
            .filter(|(name, _)| name != AVG_KEY)
            .map(|(_, v)| *v)
            .collect();
        let avg = mean(&values).ok_or(Error::EmptyAverage)?;
        self.entries.retain(|(name, _)| name != AVG_KEY);
        self.entries.push((AVG_KEY.to_string(), avg));
        Ok(self)
    }

    /// One `name  value` line per entry, names padded to a common width.
    #[must_use]
    pub fn format(&self) -> String {
        let width = self.entries.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
        let mut out = String::new();
        for (name, value) in &self.entries {
            let _ = writeln!(out, "{name:<width$}  {value:>6.2}");
        }
        out
    }
}

impl Serialize for ResultsTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Metrics for one corruption.
#[derive(Debug, Clone, Serialize)]
pub struct CorruptionResult {
    /// Corruption name.
    pub name: String,

    /// Mean per-batch top-1 accuracy, percent.
    pub top1: f64,

    /// Mean per-batch top-5 accuracy, percent.
    pub top5: f64,

    /// Mean per-batch cross-entropy.
    pub loss: f64,

    /// Number of samples evaluated.
    pub samples: usize,

    /// Number of batches evaluated.
    pub batches: usize,

    /// Fingerprint of the data files, if the source provides one.
    pub checksum: Option<String>,

    /// Wall time for loading and evaluation.
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

/// Full report for one weight file.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    /// Weight file basename, without extension.
    pub name: String,

    /// Architecture name.
    pub architecture: String,

    /// Input stage applied before inference.
    pub input_stage: String,

    /// When this report was generated.
    #[serde(with = "chrono_serde")]
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Per-corruption details, in evaluation order.
    pub corruptions: Vec<CorruptionResult>,

    /// Finalized accuracy table, `avg` last.
    pub table: ResultsTable,
}

impl BenchmarkReport {
    /// Overall average accuracy.
    #[must_use]
    pub fn average(&self) -> Option<f64> {
        self.table.average()
    }

    /// Chart title, `"<name> / avg=<avg>"`.
    #[must_use]
    pub fn title(&self) -> String {
        format!("{} / avg={:.2}", self.name, self.average().unwrap_or(f64::NAN))
    }

    /// Chart configuration for this report.
    #[must_use]
    pub fn chart_config(&self) -> BarChartConfig {
        BarChartConfig::new(self.title())
    }

    /// Chart bars, one per table entry.
    #[must_use]
    pub fn bars(&self) -> Vec<(String, f64)> {
        self.table.entries().to_vec()
    }

    /// Look up a corruption's details.
    #[must_use]
    pub fn result(&self, name: &str) -> Option<&CorruptionResult> {
        self.corruptions.iter().find(|r| r.name == name)
    }
}

mod duration_millis {
    use serde::{Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }
}

mod chrono_serde {
    use chrono::{DateTime, Utc};
    use serde::{Serialize, Serializer};

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        dt.to_rfc3339().serialize(serializer)
    }
}
