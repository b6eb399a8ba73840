//! Durable batch progress as a CSV snapshot.
//!
//! The file has a `query,message` header and one row per completed query in
//! submission order. Each save rewrites the whole snapshot through a sibling
//! temp file that is renamed over the target, so a crash mid-write leaves the
//! previous snapshot intact.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::models::CheckpointRecord;
use crate::progress::{BatchEvent, Reporter};

/// Write `rows` as CSV (with header) to `writer`.
pub fn write_records<W: Write>(writer: W, rows: &[CheckpointRecord]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["query", "message"])?;
    for row in rows {
        csv_writer.write_record([row.query.as_str(), row.message.as_str()])?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Replace the snapshot at `path` with `rows`.
pub fn save_checkpoint(rows: &[CheckpointRecord], path: &Path, reporter: &dyn Reporter) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create checkpoint directory: {}", parent.display()))?;
    }

    let tmp = temp_path(path);
    {
        let file = File::create(&tmp)
            .with_context(|| format!("Failed to create checkpoint file: {}", tmp.display()))?;
        write_records(file, rows)
            .with_context(|| format!("Failed to write checkpoint file: {}", tmp.display()))?;
    }
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace checkpoint file: {}", path.display()))?;

    reporter.report(BatchEvent::CheckpointSaved {
        rows: rows.len(),
        path: path.to_path_buf(),
    });
    Ok(())
}

/// Read the snapshot at `path`. A missing file is an empty snapshot.
///
/// Columns are taken by position: the first is the query, the second the
/// message. Extra columns are ignored.
pub fn load_checkpoint(path: &Path) -> Result<Vec<CheckpointRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)
        .with_context(|| format!("Failed to open checkpoint file: {}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| {
            format!("Malformed checkpoint row {} in {}", i + 2, path.display())
        })?;
        rows.push(CheckpointRecord::new(
            record.get(0).unwrap_or_default(),
            record.get(1).unwrap_or_default(),
        ));
    }
    Ok(rows)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
