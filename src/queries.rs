//! Loading query lists for `pxb batch`.
//!
//! `.csv` files are read with a header row; the column named `query`
//! (case-insensitive) is used, or the first column if there is none. Any
//! other file is read as one query per non-blank line.

use anyhow::{bail, Context, Result};
use std::path::Path;

pub fn load_queries(path: &Path) -> Result<Vec<String>> {
    let is_csv = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));

    let queries = if is_csv {
        load_csv(path)?
    } else {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read query file: {}", path.display()))?;
        parse_lines(&content)
    };

    if queries.is_empty() {
        bail!("No queries found in {}", path.display());
    }
    Ok(queries)
}

fn parse_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn load_csv(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open query file: {}", path.display()))?;

    let column = reader
        .headers()
        .with_context(|| format!("Failed to read CSV header in {}", path.display()))?
        .iter()
        .position(|h| h.eq_ignore_ascii_case("query"))
        .unwrap_or(0);

    let mut queries = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("Malformed row {} in {}", i + 2, path.display()))?;
        if let Some(q) = record.get(column).filter(|q| !q.is_empty()) {
            queries.push(q.to_string());
        }
    }
    Ok(queries)
}
