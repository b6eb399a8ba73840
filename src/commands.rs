//! Command implementations behind the `pxb` binary.
//!
//! Each function takes the loaded [`Config`] (already merged with CLI
//! overrides), prints results to stdout, and leaves progress and warnings to
//! the [`Reporter`] on stderr.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::batch::{run_batch, BatchOptions};
use crate::checkpoint::write_records;
use crate::config::Config;
use crate::progress::Reporter;
use crate::providers::{list_providers, ProviderDiscovery};
use crate::queries::load_queries;
use crate::query::QueryExecutor;
use crate::retry::{RetryPolicy, RetryingExecutor};

async fn connect(cfg: &Config) -> Result<QueryExecutor> {
    let discovery = ProviderDiscovery::new(cfg.models.clone());
    QueryExecutor::connect(cfg.endpoint(), &discovery).await
}

/// `pxb search`: one query with retries.
pub async fn run_search(
    cfg: &Config,
    query: &str,
    json: bool,
    verbose: bool,
    reporter: &dyn Reporter,
) -> Result<()> {
    let executor = connect(cfg).await?;
    let policy = RetryPolicy::new(cfg.search.max_retries, cfg.backoff_unit());
    let result = RetryingExecutor::new(&executor, policy, reporter)
        .run(query, cfg.search.mode, verbose)
        .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if !result.has_answer() {
        println!("No answer.");
        return Ok(());
    }

    println!("{}", result.message.trim());
    if !result.sources.is_empty() {
        println!();
        println!("Sources:");
        for (i, url) in result.sources.iter().enumerate() {
            println!("  {}. {}", i + 1, url);
        }
    }
    Ok(())
}

/// `pxb batch`: run a query file and write `query,message` CSV.
pub async fn run_batch_file(
    cfg: &Config,
    input: &Path,
    output: Option<PathBuf>,
    options: &BatchOptions,
    reporter: &dyn Reporter,
) -> Result<()> {
    let queries = load_queries(input)?;
    let executor = connect(cfg).await?;
    let rows = run_batch(&executor, &queries, options, reporter).await?;

    match output {
        Some(path) => {
            let file = std::fs::File::create(&path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            write_records(file, &rows)?;
            let answered = rows.iter().filter(|r| !r.message.is_empty()).count();
            eprintln!(
                "wrote {} rows ({} answered) to {}",
                rows.len(),
                answered,
                path.display()
            );
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            write_records(&mut lock, &rows)?;
            lock.flush()?;
        }
    }
    Ok(())
}

/// `pxb providers`: list what the instance offers.
pub async fn run_providers(cfg: &Config) -> Result<()> {
    let providers = list_providers(&cfg.endpoint()).await?;
    if providers.is_empty() {
        println!("No providers configured at {}.", cfg.endpoint().base_url());
        return Ok(());
    }

    for provider in &providers {
        println!("{} ({})", provider.name, provider.id);
        for m in &provider.chat_models {
            println!("    chat       {}", m.key);
        }
        for m in &provider.embedding_models {
            println!("    embedding  {}", m.key);
        }
    }
    Ok(())
}
