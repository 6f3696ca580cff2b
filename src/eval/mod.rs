//! Evaluation session and report generation.
//!
//! - [`session::EvalSession`]: runs a classifier over a corruption catalog
//! - [`session::EvalConfig`]: configuration for a run
//! - [`session::EvalState`]: progress states passed to the observer
//! - [`report`]: results table and report types

pub mod report;
pub mod session;

pub use report::{AVG_KEY, BenchmarkReport, CorruptionResult, ResultsTable};
pub use session::{EvalConfig, EvalSession, EvalState, ProgressFn, ReportFiles, report_name};
