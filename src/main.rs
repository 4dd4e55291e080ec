//! # outlier-consensus
//!
//! Command-line interface: one subcommand per pipeline phase.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use outlier_consensus::config::{CliOverrides, PipelineConfig};
use outlier_consensus::pipeline::{Phase, Pipeline};
use outlier_consensus::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "outlier-consensus")]
#[command(about = "Outlier detection and method consensus for power-consumption data", long_about = None)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Cleaned input CSV
    #[arg(short, long, global = true)]
    input: Option<PathBuf>,

    /// Directory for flag and comparison tables
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Directory for text reports
    #[arg(long, global = true)]
    report_dir: Option<PathBuf>,

    /// Isolation forest seed
    #[arg(long, global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep z-score thresholds and write the selected flags
    Zscore,
    /// Sweep isolation forest contamination and write the selected flags
    Iforest,
    /// Sweep LOF neighbour counts and write the selected flags
    Lof,
    /// Compare the three flag files written by earlier phases
    Compare,
    /// Run all detectors, then compare
    All,
}

impl From<&Commands> for Phase {
    fn from(command: &Commands) -> Self {
        match command {
            Commands::Zscore => Phase::ZScore,
            Commands::Iforest => Phase::IsolationForest,
            Commands::Lof => Phase::Lof,
            Commands::Compare => Phase::Compare,
            Commands::All => Phase::All,
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let overrides = CliOverrides {
        input: cli.common.input,
        output_dir: cli.common.output_dir,
        report_dir: cli.common.report_dir,
        seed: cli.common.seed,
    };
    let config = PipelineConfig::load(cli.common.config.as_deref(), Some(&overrides))?;
    let outcome = Pipeline::new(config).run(Phase::from(&cli.command))?;

    for path in &outcome.written {
        println!("Saved: {}", path.display());
    }
    if let Some(summary) = outcome.summary {
        println!(
            "Consensus outliers (2+ methods): {} ({:.2}%)",
            summary.consensus_count,
            summary.consensus_percentage()
        );
        println!(
            "High-confidence outliers (all 3): {} ({:.2}%)",
            summary.all_three_count,
            summary.all_three_percentage()
        );
    }
    Ok(())
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "outlier_consensus=info".into()),
        )
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
