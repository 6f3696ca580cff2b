//! Evaluation session: runs a classifier over every corruption in a catalog.
//!
//! For each corruption the session opens the dataset through a
//! [`DatasetSource`], walks it in unshuffled batches, applies the configured
//! [`InputStage`], and accumulates per-batch top-1, top-5 and loss. Progress
//! is reported through an optional observer callback instead of printing.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::catalog::default_catalog;
use crate::dataset::loader::worker_pool;
use crate::dataset::{BatchLoader, DatasetSource};
use crate::error::{Error, Result};
use crate::eval::report::{AVG_KEY, BenchmarkReport, CorruptionResult, ResultsTable};
use crate::frequency::InputStage;
use crate::model::Classifier;
use crate::stats::raster::save_png;
use crate::stats::{AverageMeter, cross_entropy, generate_bar_svg, render_bar_png, top_k_accuracy};

/// Ranks scored for every batch: top-1 and top-5.
const TOP_K: [usize; 2] = [1, 5];

/// Where the session is in its run.
///
/// Each corruption goes `LoadingDataset -> RunningBatches (once per batch) ->
/// Aggregated -> Idle`; `Reporting` follows the last one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvalState<'a> {
    /// Between corruptions.
    Idle,
    /// Opening the dataset.
    LoadingDataset {
        /// Corruption being opened.
        corruption: &'a str,
    },
    /// A batch finished.
    RunningBatches {
        /// Corruption being evaluated.
        corruption: &'a str,
        /// Batches done so far.
        batch: usize,
        /// Total batches.
        total: usize,
    },
    /// A corruption's accuracy was recorded.
    Aggregated {
        /// Corruption evaluated.
        corruption: &'a str,
        /// Its average top-1 accuracy.
        accuracy: f64,
    },
    /// All corruptions done, building the report.
    Reporting,
}

/// Progress callback type.
pub type ProgressFn = Box<dyn Fn(&EvalState<'_>) + Send + Sync>;

/// Configuration for an evaluation session.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Directory for charts and reports.
    pub fig_dir: PathBuf,

    /// Corruptions to evaluate, in order.
    pub corruptions: Vec<String>,

    /// Samples per batch.
    pub batch_size: usize,

    /// Threads materializing samples.
    pub workers: usize,

    /// Batch preprocessing before inference.
    pub input_stage: InputStage,
}

impl EvalConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> EvalConfigBuilder {
        EvalConfigBuilder::default()
    }
}

/// Builder for [`EvalConfig`].
#[derive(Debug, Default)]
pub struct EvalConfigBuilder {
    fig_dir: Option<PathBuf>,
    corruptions: Option<Vec<String>>,
    batch_size: Option<usize>,
    workers: Option<usize>,
    input_stage: Option<InputStage>,
}

impl EvalConfigBuilder {
    /// Set the output directory. Default `figs`.
    #[must_use]
    pub fn fig_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.fig_dir = Some(path.into());
        self
    }

    /// Set the corruptions to evaluate. Default: the built-in catalog.
    #[must_use]
    pub fn corruptions(mut self, names: Vec<String>) -> Self {
        self.corruptions = Some(names);
        self
    }

    /// Set the batch size. Default 1024.
    #[must_use]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Set the worker count. Default 4.
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Set the input stage. Default [`InputStage::Identity`].
    #[must_use]
    pub fn input_stage(mut self, stage: InputStage) -> Self {
        self.input_stage = Some(stage);
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if the batch size is zero or the corruption
    /// list is empty.
    pub fn build(self) -> Result<EvalConfig> {
        let config = EvalConfig {
            fig_dir: self.fig_dir.unwrap_or_else(|| PathBuf::from("figs")),
            corruptions: self.corruptions.unwrap_or_else(default_catalog),
            batch_size: self.batch_size.unwrap_or(1024),
            workers: self.workers.unwrap_or(4),
            input_stage: self.input_stage.unwrap_or_default(),
        };
        if config.batch_size == 0 {
            return Err(Error::Configuration("batch size must be at least 1".to_string()));
        }
        if config.corruptions.is_empty() {
            return Err(Error::Configuration("no corruptions to evaluate".to_string()));
        }
        Ok(config)
    }
}

/// Files written for one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFiles {
    /// Bar chart, PNG.
    pub png: PathBuf,
    /// Bar chart, SVG.
    pub svg: PathBuf,
    /// Full report, JSON.
    pub json: PathBuf,
    /// Per-corruption summary, CSV.
    pub csv: PathBuf,
}

/// Evaluation session for robustness benchmarks.
///
/// # Example
///
/// ```rust,ignore
/// use corruption_bench::{
///     Architecture, BenchmarkSource, ChannelStats, EvalConfig, EvalSession, EvalState, Transform,
/// };
///
/// let config = EvalConfig::builder().fig_dir("figs").batch_size(512).build()?;
/// let session = EvalSession::new(config)?
///     .with_observer(Box::new(|state: &EvalState<'_>| eprintln!("{state:?}")));
///
/// let source = BenchmarkSource::new("data", Some(Transform::standard(ChannelStats::CIFAR10)));
/// let model = Architecture::Linear.load("weights/linear.json".as_ref())?;
/// let report = session.run("linear", "linear", model.as_ref(), &source)?;
/// session.write_report(&report)?;
/// ```
pub struct EvalSession {
    config: EvalConfig,
    pool: rayon::ThreadPool,
    observer: Option<ProgressFn>,
}

impl EvalSession {
    /// Create a session and its worker pool.
    pub fn new(config: EvalConfig) -> Result<Self> {
        let pool = worker_pool(config.workers)?;
        Ok(Self {
            config,
            pool,
            observer: None,
        })
    }

    /// Register a progress observer.
    #[must_use]
    pub fn with_observer(mut self, observer: ProgressFn) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The session configuration.
    #[must_use]
    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    fn notify(&self, state: EvalState<'_>) {
        if let Some(observer) = &self.observer {
            observer(&state);
        }
    }

    /// Evaluate `classifier` on every configured corruption.
    ///
    /// `name` labels the report (usually the weight file's basename). Any
    /// dataset or inference error aborts the run.
    pub fn run(
        &self,
        name: &str,
        architecture: &str,
        classifier: &dyn Classifier,
        source: &dyn DatasetSource,
    ) -> Result<BenchmarkReport> {
        let mut table = ResultsTable::new();
        let mut corruptions = Vec::with_capacity(self.config.corruptions.len());

        self.notify(EvalState::Idle);
        for corruption in &self.config.corruptions {
            let result = self.evaluate_corruption(corruption, classifier, source)?;
            table.insert(corruption.as_str(), result.top1);
            self.notify(EvalState::Aggregated {
                corruption,
                accuracy: result.top1,
            });
            corruptions.push(result);
            self.notify(EvalState::Idle);
        }

        self.notify(EvalState::Reporting);
        Ok(BenchmarkReport {
            name: name.to_string(),
            architecture: architecture.to_string(),
            input_stage: self.config.input_stage.describe(),
            timestamp: chrono::Utc::now(),
            corruptions,
            table: table.finalize()?,
        })
    }

    /// Evaluate one corruption.
    pub fn evaluate_corruption(
        &self,
        corruption: &str,
        classifier: &dyn Classifier,
        source: &dyn DatasetSource,
    ) -> Result<CorruptionResult> {
        let classes = classifier.num_classes();
        if let Some(&k) = TOP_K.iter().find(|&&k| k > classes) {
            return Err(Error::InvalidTopK { k, classes });
        }

        let start = Instant::now();
        self.notify(EvalState::LoadingDataset { corruption });
        let dataset = source.open(corruption)?;

        let loader = BatchLoader::new(dataset.as_ref(), self.config.batch_size, &self.pool)?;
        let total = loader.num_batches();

        let mut top1 = AverageMeter::new();
        let mut top5 = AverageMeter::new();
        let mut loss = AverageMeter::new();
        let mut samples = 0;

        for (index, batch) in loader.enumerate() {
            let batch = batch?;
            let images = self.config.input_stage.apply(batch.images)?;
            let logits = classifier.forward(images.view())?;

            let accuracy = top_k_accuracy(logits.view(), &batch.labels, &TOP_K)?;
            top1.update(accuracy[0]);
            top5.update(accuracy[1]);
            loss.update(cross_entropy(logits.view(), &batch.labels)?);
            samples += batch.labels.len();

            self.notify(EvalState::RunningBatches {
                corruption,
                batch: index + 1,
                total,
            });
        }

        Ok(CorruptionResult {
            name: corruption.to_string(),
            top1: top1.average()?,
            top5: top5.average()?,
            loss: loss.average()?,
            samples,
            batches: top1.count(),
            checksum: dataset.checksum().map(str::to_string),
            elapsed: start.elapsed(),
        })
    }

    /// Write the chart (PNG and SVG), the JSON report and the CSV summary to
    /// the configured directory, each named after the report.
    pub fn write_report(&self, report: &BenchmarkReport) -> Result<ReportFiles> {
        let dir = &self.config.fig_dir;
        std::fs::create_dir_all(dir)?;
        let files = ReportFiles {
            png: dir.join(format!("{}.png", report.name)),
            svg: dir.join(format!("{}.svg", report.name)),
            json: dir.join(format!("{}.json", report.name)),
            csv: dir.join(format!("{}.csv", report.name)),
        };

        let bars = report.bars();
        let chart = report.chart_config();
        save_png(&files.png, &render_bar_png(&bars, &chart))?;
        std::fs::write(&files.svg, generate_bar_svg(&bars, &chart))?;

        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(&files.json, json)?;

        self.write_csv_summary(report, &files.csv)?;
        Ok(files)
    }

    /// Write a CSV summary of the report.
    fn write_csv_summary(&self, report: &BenchmarkReport, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;

        wtr.write_record([
            "corruption",
            "top1",
            "top5",
            "loss",
            "samples",
            "batches",
            "checksum",
            "elapsed_ms",
        ])?;

        for result in &report.corruptions {
            wtr.write_record([
                result.name.clone(),
                format!("{:.4}", result.top1),
                format!("{:.4}", result.top5),
                format!("{:.6}", result.loss),
                result.samples.to_string(),
                result.batches.to_string(),
                result.checksum.clone().unwrap_or_default(),
                result.elapsed.as_millis().to_string(),
            ])?;
        }

        if let Some(avg) = report.average() {
            wtr.write_record([AVG_KEY, format!("{avg:.4}").as_str(), "", "", "", "", "", ""])?;
        }

        wtr.flush()?;
        Ok(())
    }
}

/// Report name for a weight file: its basename without extension.
///
/// ```
/// use corruption_bench::eval::report_name;
/// use std::path::Path;
///
/// assert_eq!(report_name(Path::new("weights/resnet_seed3.json")), "resnet_seed3");
/// ```
#[must_use]
pub fn report_name(weight_path: &Path) -> String {
    weight_path
        .file_stem()
        .map_or_else(|| "model".to_string(), |s| s.to_string_lossy().into_owned())
}
