//! # corruption-bench
//!
//! Robustness benchmark for CIFAR-10 image classifiers.
//!
//! A classifier is evaluated on the clean test set and on every corrupted
//! copy of it named in a catalog (CIFAR-10-C style). The result is a table of
//! per-corruption top-1 accuracy with an overall `avg` entry, plus a bar chart
//! and detailed JSON/CSV reports.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use corruption_bench::{
//!     Architecture, BenchmarkSource, ChannelStats, EvalConfig, EvalSession, Transform,
//! };
//!
//! let config = EvalConfig::builder().fig_dir("figs").build()?;
//! let session = EvalSession::new(config)?;
//!
//! let source = BenchmarkSource::new("data", Some(Transform::standard(ChannelStats::CIFAR10)));
//! let model = Architecture::Mlp.load("weights/mlp_seed0.json".as_ref())?;
//!
//! let report = session.run("mlp_seed0", "mlp", model.as_ref(), &source)?;
//! print!("{}", report.table.format());
//! session.write_report(&report)?;
//! ```
//!
//! ## Modules
//!
//! - [`error`]: Error types for the library
//! - [`catalog`]: Corruption name lists
//! - [`dataset`]: Clean and corrupted datasets, transforms, batching
//! - [`model`]: Classifier trait, architectures and checkpoints
//! - [`frequency`]: Fourier-domain band-pass input stage
//! - [`stats`]: Accuracy metrics and charts
//! - [`eval`]: Evaluation session and reports

pub mod catalog;
pub mod dataset;
pub mod error;
pub mod eval;
pub mod frequency;
pub mod model;
pub mod stats;

// Re-export commonly used types
pub use catalog::{NATURAL, default_catalog, load_catalog};
pub use dataset::{
    BenchmarkSource, ChannelStats, DatasetSource, ImageDataset, LabeledDataset, Sample, Transform,
    TransformStep,
};
pub use error::{Error, Result};
pub use eval::{
    BenchmarkReport, CorruptionResult, EvalConfig, EvalSession, EvalState, ResultsTable,
};
pub use frequency::{FrequencyFilter, InputStage};
pub use model::{Architecture, Checkpoint, Classifier};
pub use stats::{AverageMeter, top_k_accuracy};
