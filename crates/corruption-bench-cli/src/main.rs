//! corruption-bench CLI - classifier robustness benchmark

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::run::RunArgs;

/// Evaluate image classifiers against corrupted test sets.
#[derive(Parser)]
#[command(name = "corruption-bench")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one or more checkpoints on every corruption
    Run(RunArgs),

    /// Print the corruption catalog
    Catalog {
        /// Catalog file (one name per line); built-in list if omitted
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Print as a JSON array
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => commands::run::run(args, cli.verbose),
        Commands::Catalog { catalog, json } => {
            commands::catalog::run(catalog.as_deref(), json, cli.verbose)
        }
    }
}
