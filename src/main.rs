//! # Perplexica Batch CLI (`pxb`)
//!
//! ## Usage
//!
//! ```bash
//! pxb --config ./pxb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pxb search "<query>"` | Ask one question, print the answer and its sources |
//! | `pxb batch <file>` | Answer every query in a file, with checkpoints and resume |
//! | `pxb providers` | List providers and models offered by the instance |
//!
//! ## Examples
//!
//! ```bash
//! # Point at a remote instance for one run
//! pxb --url http://10.0.0.5:3000 search "Who maintains tokio?"
//!
//! # Batch with a checkpoint every 20 queries
//! pxb batch questions.csv --checkpoint-file cp.csv --checkpoint-every 20 --output answers.csv
//!
//! # Continue an interrupted batch at query 141
//! pxb batch questions.csv --checkpoint-file cp.csv --resume-from 141 --output answers.csv
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use perplexica_batch::batch::BatchOptions;
use perplexica_batch::commands;
use perplexica_batch::config::{self, CheckpointCadence, Config};
use perplexica_batch::models::OptimizationMode;
use perplexica_batch::progress::ProgressMode;

/// Perplexica Batch CLI — resumable batches of source-backed answers.
///
/// Settings come from a TOML file (`--config`, optional) and can be
/// overridden per run with the flags below.
#[derive(Parser)]
#[command(
    name = "pxb",
    about = "Perplexica Batch — resumable batches of source-backed answers",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply if it does not exist.
    #[arg(long, global = true, default_value = "./pxb.toml")]
    config: PathBuf,

    /// Base URL of the Perplexica instance (overrides `[server].base_url`).
    #[arg(long, global = true)]
    url: Option<String>,

    /// Optimisation mode: `speed` or `balanced`.
    #[arg(long, global = true)]
    mode: Option<OptimizationMode>,

    /// Retries per query after the first attempt.
    #[arg(long, global = true)]
    retries: Option<u32>,

    /// Announce each query and each retry.
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Progress output on stderr. Defaults to `human` on a TTY or with
    /// `--verbose`, else `off`.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question.
    Search {
        /// The question to send.
        query: String,

        /// Print the result as JSON (`message`, `sources`).
        #[arg(long)]
        json: bool,
    },

    /// Answer every query in a file.
    ///
    /// Text files hold one query per line; CSV files use the `query`
    /// column. Results are written as `query,message` CSV.
    Batch {
        /// Query file (`.txt` or `.csv`).
        input: PathBuf,

        /// Write results here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Seconds to wait between queries.
        #[arg(long)]
        delay: Option<f64>,

        /// Checkpoint every N queries, or `disabled`.
        #[arg(long)]
        checkpoint_every: Option<CheckpointCadence>,

        /// Checkpoint file (CSV).
        #[arg(long)]
        checkpoint_file: Option<PathBuf>,

        /// 1-based position to continue from; earlier rows come from the checkpoint.
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        resume_from: Option<u64>,
    },

    /// List providers and models offered by the instance.
    Providers,
}

/// Apply the global CLI overrides to the loaded config.
fn apply_overrides(cfg: &mut Config, cli: &Cli) -> anyhow::Result<()> {
    if let Some(url) = &cli.url {
        cfg.server.base_url = url.clone();
    }
    if let Some(mode) = cli.mode {
        cfg.search.mode = mode;
    }
    if let Some(retries) = cli.retries {
        cfg.search.max_retries = retries;
    }
    if let Commands::Batch {
        delay,
        checkpoint_every,
        checkpoint_file,
        ..
    } = &cli.command
    {
        if let Some(delay) = delay {
            cfg.batch.delay_secs = *delay;
        }
        if let Some(cadence) = checkpoint_every {
            cfg.batch.checkpoint_every = *cadence;
        }
        if let Some(path) = checkpoint_file {
            cfg.batch.checkpoint_file = Some(path.clone());
        }
    }
    cfg.validate()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = config::load_config_or_default(&cli.config)?;
    apply_overrides(&mut cfg, &cli)?;

    let reporter = ProgressMode::resolve(cli.progress, cli.verbose).reporter();

    match cli.command {
        Commands::Search { query, json } => {
            commands::run_search(&cfg, &query, json, cli.verbose, reporter.as_ref()).await?;
        }
        Commands::Batch {
            input,
            output,
            resume_from,
            ..
        } => {
            let options = BatchOptions {
                resume_from: resume_from.map(|r| r as usize),
                verbose: cli.verbose,
                ..BatchOptions::from_config(&cfg)
            };
            commands::run_batch_file(&cfg, &input, output, &options, reporter.as_ref()).await?;
        }
        Commands::Providers => {
            commands::run_providers(&cfg).await?;
        }
    }

    Ok(())
}
