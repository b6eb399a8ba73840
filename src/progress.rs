//! Batch and query progress reporting.
//!
//! Every notice the engine emits (query sent, retrying, per-query progress,
//! checkpoint saves) and every non-fatal warning flows through a
//! [`Reporter`]. Output goes to **stderr** so stdout remains parseable for
//! scripts (batch results are written to stdout as CSV).

use std::io::Write;
use std::path::PathBuf;

/// Maximum number of characters of a query shown in progress lines.
pub const PREVIEW_CHARS: usize = 60;

/// A single progress event.
#[derive(Clone, Debug, PartialEq)]
pub enum BatchEvent {
    /// A query is about to be sent (verbose only).
    QuerySent { query: String },
    /// An attempt failed with an error (verbose only).
    AttemptFailed { attempt: u32, reason: String },
    /// A further attempt is about to run (verbose only).
    Retrying { attempt: u32, total: u32 },
    /// Rows reused from a checkpoint when resuming.
    CheckpointReused { rows: usize },
    /// Query `n` of `total` finished.
    Progress {
        n: usize,
        total: usize,
        preview: String,
    },
    /// A checkpoint snapshot was written.
    CheckpointSaved { rows: usize, path: PathBuf },
    /// Non-fatal problem; the batch continues.
    Warning { message: String },
}

impl BatchEvent {
    pub fn warning(message: impl Into<String>) -> Self {
        BatchEvent::Warning {
            message: message.into(),
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, BatchEvent::Warning { .. })
    }
}

/// Receives progress events. Implementations write to stderr (human or JSON).
pub trait Reporter: Send + Sync {
    fn report(&self, event: BatchEvent);
}

/// Human-friendly progress on stderr: `[3/120] What is the capital of Fra...`.
pub struct StderrProgress;

impl Reporter for StderrProgress {
    fn report(&self, event: BatchEvent) {
        let line = match &event {
            BatchEvent::QuerySent { query } => format!("sending query: {}\n", query),
            BatchEvent::AttemptFailed { attempt, reason } => {
                format!("attempt {} failed: {}\n", attempt, reason)
            }
            BatchEvent::Retrying { attempt, total } => {
                format!("retrying, attempt {} of {}\n", attempt, total)
            }
            BatchEvent::CheckpointReused { rows } => {
                format!("resuming: reused {} rows from checkpoint\n", rows)
            }
            BatchEvent::Progress { n, total, preview } => {
                format!("[{}/{}] {}\n", n, total, preview)
            }
            BatchEvent::CheckpointSaved { rows, path } => {
                format!("checkpoint saved: {} rows -> {}\n", rows, path.display())
            }
            BatchEvent::Warning { message } => format!("Warning: {}\n", message),
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl Reporter for JsonProgress {
    fn report(&self, event: BatchEvent) {
        let ts = chrono::Utc::now().to_rfc3339();
        let obj = match &event {
            BatchEvent::QuerySent { query } => serde_json::json!({
                "ts": ts, "event": "query_sent", "query": query
            }),
            BatchEvent::AttemptFailed { attempt, reason } => serde_json::json!({
                "ts": ts, "event": "attempt_failed", "attempt": attempt, "reason": reason
            }),
            BatchEvent::Retrying { attempt, total } => serde_json::json!({
                "ts": ts, "event": "retrying", "attempt": attempt, "total": total
            }),
            BatchEvent::CheckpointReused { rows } => serde_json::json!({
                "ts": ts, "event": "checkpoint_reused", "rows": rows
            }),
            BatchEvent::Progress { n, total, preview } => serde_json::json!({
                "ts": ts, "event": "progress", "n": n, "total": total, "query": preview
            }),
            BatchEvent::CheckpointSaved { rows, path } => serde_json::json!({
                "ts": ts, "event": "checkpoint_saved", "rows": rows, "path": path.display().to_string()
            }),
            BatchEvent::Warning { message } => serde_json::json!({
                "ts": ts, "event": "warning", "message": message
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// Prints warnings only; progress is dropped.
pub struct QuietProgress;

impl Reporter for QuietProgress {
    fn report(&self, event: BatchEvent) {
        if event.is_warning() {
            StderrProgress.report(event);
        }
    }
}

/// Bounded preview of a query for progress lines.
pub fn preview(query: &str) -> String {
    let single_line = query.replace('\n', " ");
    let trimmed = single_line.trim();
    if trimmed.chars().count() <= PREVIEW_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(PREVIEW_CHARS).collect();
    out.push_str("...");
    out
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Mode for a run: an explicit `--progress` wins, `--verbose` asks for
    /// human output, otherwise the TTY default applies.
    pub fn resolve(explicit: Option<ProgressMode>, verbose: bool) -> Self {
        match explicit {
            Some(mode) => mode,
            None if verbose => ProgressMode::Human,
            None => Self::default_for_tty(),
        }
    }

    pub fn reporter(&self) -> Box<dyn Reporter> {
        match self {
            ProgressMode::Off => Box::new(QuietProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
