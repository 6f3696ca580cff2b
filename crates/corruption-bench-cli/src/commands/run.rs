//! Run command: evaluate checkpoints against the corruption benchmark.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use corruption_bench::eval::{ReportFiles, report_name};
use corruption_bench::{
    Architecture, BenchmarkSource, ChannelStats, Error, EvalConfig, EvalSession, EvalState,
    InputStage, Transform,
};

use super::catalog;

/// Arguments for `corruption-bench run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Architecture of the checkpoints (linear, mlp)
    #[arg(long)]
    pub arch: String,

    /// A single checkpoint file
    #[arg(long, conflicts_with = "weight_dir")]
    pub weight_path: Option<PathBuf>,

    /// Directory of checkpoints; every *.json file is evaluated
    #[arg(long)]
    pub weight_dir: Option<PathBuf>,

    /// Output directory for charts and reports
    #[arg(long, default_value = "figs")]
    pub fig_dir: PathBuf,

    /// Benchmark root holding cifar10/ and cifar10-c/
    #[arg(long, env = "CORRUPTION_BENCH_DATA_ROOT")]
    pub data_root: PathBuf,

    /// Samples per batch
    #[arg(long, default_value_t = 1024)]
    pub batch_size: usize,

    /// Corruptions to evaluate (overrides the catalog)
    #[arg(long, num_args = 1..)]
    pub corruptions: Vec<String>,

    /// Catalog file; built-in list if omitted
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Threads used to materialize batches
    #[arg(long, default_value_t = 4)]
    pub workers: usize,

    /// Inner radius of the frequency band-pass stage
    #[arg(long)]
    pub band_inner: Option<f64>,

    /// Outer radius of the frequency band-pass stage
    #[arg(long)]
    pub band_outer: Option<f64>,
}

pub fn run(args: RunArgs, verbose: bool) -> Result<()> {
    let arch = Architecture::from_name(&args.arch)?;
    let weights = weight_files(args.weight_path.as_deref(), args.weight_dir.as_deref())?;
    let corruptions = if args.corruptions.is_empty() {
        catalog::resolve(args.catalog.as_deref())?
    } else {
        args.corruptions.clone()
    };

    let config = EvalConfig::builder()
        .fig_dir(&args.fig_dir)
        .corruptions(corruptions)
        .batch_size(args.batch_size)
        .workers(args.workers)
        .input_stage(input_stage(args.band_inner, args.band_outer))
        .build()?;

    if verbose {
        eprintln!("Architecture: {arch}");
        eprintln!("Data root: {}", args.data_root.display());
        eprintln!("Input stage: {}", config.input_stage.describe());
        eprintln!("Corruptions: {}", config.corruptions.len());
        eprintln!("Weight files: {}", weights.len());
    }

    let session = EvalSession::new(config)?.with_observer(Box::new(
        move |state: &EvalState<'_>| match state {
            EvalState::LoadingDataset { corruption } if verbose => {
                eprintln!("Loading {corruption}...");
            }
            EvalState::RunningBatches { corruption, batch, total } if verbose => {
                eprintln!("  {corruption}: batch {batch}/{total}");
            }
            EvalState::Aggregated { corruption, accuracy } => {
                eprintln!("{corruption}: {accuracy:.2}");
            }
            _ => {}
        },
    ));
    let source = BenchmarkSource::new(&args.data_root, Some(Transform::standard(ChannelStats::CIFAR10)));

    let mut failed = 0;
    for path in &weights {
        match evaluate(&session, arch, path, &source) {
            Ok(files) => {
                println!("Saved chart to: {}", files.png.display());
                if verbose {
                    eprintln!("Saved report to: {}", files.json.display());
                }
            }
            Err(err) => {
                eprintln!("Error: {err:#}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} weight files failed", weights.len());
    }
    Ok(())
}

fn evaluate(
    session: &EvalSession,
    arch: Architecture,
    path: &Path,
    source: &BenchmarkSource,
) -> Result<ReportFiles> {
    let name = report_name(path);
    let model = arch
        .load(path)
        .with_context(|| format!("Failed to load checkpoint {}", path.display()))?;

    let report = session
        .run(&name, arch.name(), model.as_ref(), source)
        .with_context(|| format!("Evaluation of {} failed", path.display()))?;

    println!("{}", report.title());
    print!("{}", report.table.format());

    session
        .write_report(&report)
        .with_context(|| format!("Failed to write report for {name}"))
}

/// Checkpoints to evaluate, in name order for a directory.
fn weight_files(weight_path: Option<&Path>, weight_dir: Option<&Path>) -> Result<Vec<PathBuf>> {
    if let Some(path) = weight_path {
        return Ok(vec![path.to_path_buf()]);
    }
    let Some(dir) = weight_dir else {
        return Err(Error::Configuration("one of --weight-path or --weight-dir is required".to_string()).into());
    };

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read weight directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(Error::Configuration(format!("no *.json checkpoints in {}", dir.display())).into());
    }
    Ok(files)
}

fn input_stage(inner: Option<f64>, outer: Option<f64>) -> InputStage {
    if inner.is_none() && outer.is_none() {
        return InputStage::Identity;
    }
    InputStage::band_pass(inner.unwrap_or(0.0), outer.unwrap_or(0.0), ChannelStats::CIFAR10)
}

#[cfg(test)]
mod tests {
    use corruption_bench::Checkpoint;
    use corruption_bench::dataset::corrupted::LABELS_FILE;
    use corruption_bench::dataset::npy::{write_npy_i64, write_npy_u8};
    use corruption_bench::model::{INPUT_FEATURES, NUM_CLASSES, StateDict, Tensor};

    use super::*;

    fn run_args(root: &Path, weight_dir: &Path) -> RunArgs {
        RunArgs {
            arch: "linear".to_string(),
            weight_path: None,
            weight_dir: Some(weight_dir.to_path_buf()),
            fig_dir: root.join("figs"),
            data_root: root.to_path_buf(),
            batch_size: 2,
            corruptions: vec!["fog".to_string()],
            catalog: None,
            workers: 1,
            band_inner: None,
            band_outer: None,
        }
    }

    fn linear_checkpoint() -> Checkpoint {
        let mut state = StateDict::new();
        state.insert(
            "fc.weight".to_string(),
            Tensor::new(vec![NUM_CLASSES, INPUT_FEATURES], vec![0.0; NUM_CLASSES * INPUT_FEATURES]).unwrap(),
        );
        state.insert(
            "fc.bias".to_string(),
            Tensor::new(vec![NUM_CLASSES], (0..NUM_CLASSES).map(|i| i as f32).collect()).unwrap(),
        );
        Checkpoint::Raw(state)
    }

    #[test]
    fn test_failing_weight_file_does_not_stop_others() {
        let root = tempfile::tempdir().unwrap();
        let shards = root.path().join("cifar10-c");
        std::fs::create_dir_all(&shards).unwrap();
        write_npy_u8(&shards.join("fog.npy"), &[2, 32, 32, 3], &vec![128; 2 * INPUT_FEATURES]).unwrap();
        write_npy_i64(&shards.join(LABELS_FILE), &[2], &[9, 1]).unwrap();

        let weights = root.path().join("weights");
        std::fs::create_dir_all(&weights).unwrap();
        std::fs::write(weights.join("a_broken.json"), "{").unwrap();
        linear_checkpoint().save(&weights.join("b_valid.json")).unwrap();

        let err = run(run_args(root.path(), &weights), false).unwrap_err();
        assert!(err.to_string().contains("1 of 2"));

        let figs = root.path().join("figs");
        assert!(figs.join("b_valid.png").is_file());
        assert!(figs.join("b_valid.json").is_file());
        assert!(!figs.join("a_broken.png").exists());
    }

    #[test]
    fn test_weight_files_requires_a_source() {
        let err = weight_files(None, None).unwrap_err();
        assert!(err.to_string().contains("--weight-path"));
    }

    #[test]
    fn test_weight_dir_sorted_json_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.json", "a.json", "notes.txt"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        let files = weight_files(None, Some(dir.path())).unwrap();
        let names: Vec<_> = files.iter().map(|p| p.file_name().unwrap().to_owned()).collect();
        assert_eq!(names, ["a.json", "b.json"]);
    }

    #[test]
    fn test_empty_weight_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(weight_files(None, Some(dir.path())).is_err());
    }

    #[test]
    fn test_input_stage_selection() {
        assert_eq!(input_stage(None, None), InputStage::Identity);
        assert_eq!(
            input_stage(None, Some(4.0)),
            InputStage::band_pass(0.0, 4.0, ChannelStats::CIFAR10)
        );
    }
}
