//! OvO Trainer CLI
//!
//! One-vs-one image-classifier training sweeps

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ovo_trainer::{
    generate_pairs, next_run_index, run_prefix, ClassifierFamily, ImageCorpus, SimulatedTrainer,
    SweepConfig, SweepRunner, TrainingResult,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ovo-trainer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a one-vs-one training sweep with the simulated trainer
    Sweep {
        /// Sweep configuration file (YAML)
        #[arg(long)]
        config: PathBuf,

        /// Printed report format
        #[arg(long, value_enum, default_value = "markdown")]
        format: OutputFormat,

        /// Target validation accuracy of the simulated trainer
        #[arg(long, default_value = "0.9")]
        target_accuracy: f64,
    },

    /// List the class pairs a sweep would train
    Pairs {
        /// Resource directory with one subdirectory per class
        #[arg(long)]
        resources: PathBuf,
    },

    /// Show image counts per class
    CorpusStats {
        /// Resource directory with one subdirectory per class
        #[arg(long)]
        path: PathBuf,
    },

    /// Print the next run directory index
    NextRun {
        /// Output root holding run directories
        #[arg(long)]
        output: PathBuf,

        /// Classifier family (binary, multilabel, ovo)
        #[arg(long, default_value = "ovo")]
        family: ClassifierFamily,
    },
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    match cli.command {
        Commands::Sweep {
            config,
            format,
            target_accuracy,
        } => {
            tracing::info!(config = %config.display(), "Loading sweep configuration");
            let sweep = SweepConfig::load(&config)
                .with_context(|| format!("failed to load {}", config.display()))?;

            let runner = SweepRunner::with_config(
                SimulatedTrainer::with_target_accuracy(target_accuracy),
                sweep.runner.to_runner_config(),
            );
            let report = runner
                .run(&sweep.to_request())
                .context("training sweep failed")?;

            let log = report.save_log().context("failed to save report")?;
            let json = report.save_json().context("failed to save JSON report")?;

            match format {
                OutputFormat::Markdown => println!("{}", report.to_markdown()),
                OutputFormat::Json => println!("{}", report.to_json()?),
            }
            println!("Report saved to {}", log.display());
            println!("JSON saved to {}", json.display());

            for failure in report.failures() {
                eprintln!("warning: {failure}");
            }
        }
        Commands::Pairs { resources } => {
            tracing::info!(resources = %resources.display(), "Listing class pairs");

            let corpus = ImageCorpus::load(&resources)
                .with_context(|| format!("failed to load {}", resources.display()))?;
            let pairs = generate_pairs(&corpus.labels());

            println!("{} classes, {} pairs", corpus.len(), pairs.len());
            for pair in &pairs {
                println!("  - {pair}");
            }
        }
        Commands::CorpusStats { path } => {
            tracing::info!(path = %path.display(), "Loading corpus statistics");

            let corpus = ImageCorpus::load(&path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            let stats = corpus.stats();
            println!("Corpus Statistics");
            println!("=================");
            println!("Path: {}", path.display());
            println!("Classes: {}", stats.total_classes);
            println!("Total images: {}", stats.total_images);
            println!("Smallest class: {}", stats.smallest_class);
            println!("Largest class: {}", stats.largest_class);
            println!("Empty classes: {}", stats.empty_classes);
            println!();
            println!("Classes:");
            for class in corpus.iter() {
                println!("  - {} ({} images)", class.label, class.len());
            }
        }
        Commands::NextRun { output, family } => {
            let prefix = run_prefix(family);
            let index = next_run_index(&output, &prefix)
                .with_context(|| format!("failed to scan {}", output.display()))?;
            println!("{}", output.join(format!("{prefix}_{index}")).display());
        }
    }

    Ok(())
}
