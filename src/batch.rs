//! Sequential, checkpointed batch execution.
//!
//! [`run_batch`] sends each query through a [`RetryingExecutor`], one at a
//! time, waiting a fixed delay between queries. Every `checkpoint_every`
//! positions the completed rows are written to the checkpoint file; a later
//! run can pass `resume_from` to reuse the checkpoint's prefix instead of
//! asking those queries again.
//!
//! # Resume semantics
//!
//! Positions are 1-based. With `resume_from = k`, positions `1..k` are taken
//! from the checkpoint **by position**, not by matching query text. Positions
//! the checkpoint cannot cover are returned with an empty message and a
//! warning, so the result always has one row per input query.

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

use crate::checkpoint::{load_checkpoint, save_checkpoint};
use crate::config::{CheckpointCadence, Config};
use crate::models::{CheckpointRecord, OptimizationMode};
use crate::progress::{preview, BatchEvent, Reporter};
use crate::query::Searcher;
use crate::retry::{RetryPolicy, RetryingExecutor};

/// Knobs for one batch invocation.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub delay: Duration,
    pub checkpoint_every: CheckpointCadence,
    pub checkpoint_file: Option<PathBuf>,
    /// 1-based position to continue from.
    pub resume_from: Option<usize>,
    pub mode: OptimizationMode,
    pub retry: RetryPolicy,
    pub verbose: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            checkpoint_every: CheckpointCadence::default(),
            checkpoint_file: None,
            resume_from: None,
            mode: OptimizationMode::default(),
            retry: RetryPolicy::default(),
            verbose: false,
        }
    }
}

impl BatchOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            delay: cfg.delay(),
            checkpoint_every: cfg.batch.checkpoint_every,
            checkpoint_file: cfg.batch.checkpoint_file.clone(),
            resume_from: None,
            mode: cfg.search.mode,
            retry: RetryPolicy::new(cfg.search.max_retries, cfg.backoff_unit()),
            verbose: false,
        }
    }
}

/// Run `queries` in order and return one `{query, message}` row per query.
///
/// Per-query failures never abort the batch; they show up as empty
/// messages. The only errors returned are from reading the checkpoint when
/// resuming.
pub async fn run_batch<S: Searcher + ?Sized>(
    searcher: &S,
    queries: &[String],
    options: &BatchOptions,
    reporter: &dyn Reporter,
) -> Result<Vec<CheckpointRecord>> {
    let n = queries.len();
    let start = options.resume_from.unwrap_or(1).max(1);
    let mut slots: Vec<Option<CheckpointRecord>> = vec![None; n];

    if let (Some(_), Some(path)) = (options.resume_from, options.checkpoint_file.as_ref()) {
        if path.exists() {
            let loaded = load_checkpoint(path)?;
            let reuse = (start - 1).min(loaded.len()).min(n);
            for (slot, row) in slots.iter_mut().zip(loaded).take(reuse) {
                *slot = Some(row);
            }
            reporter.report(BatchEvent::CheckpointReused { rows: reuse });
        }
    }

    let executor = RetryingExecutor::new(searcher, options.retry, reporter);
    let mut warned_no_path = false;

    for i in start..=n {
        let query = &queries[i - 1];
        let result = executor.run(query, options.mode, options.verbose).await;
        slots[i - 1] = Some(CheckpointRecord::new(query.clone(), result.message));

        reporter.report(BatchEvent::Progress {
            n: i,
            total: n,
            preview: preview(query),
        });

        if options.checkpoint_every.is_due(i) {
            match options.checkpoint_file.as_ref() {
                None => {
                    if !warned_no_path {
                        reporter.report(BatchEvent::warning(
                            "checkpoint_every is set but no checkpoint_file was configured; skipping checkpoint",
                        ));
                        warned_no_path = true;
                    }
                }
                Some(path) => {
                    let (rows, _) = fill_gaps(&slots[..i], &queries[..i]);
                    if let Err(e) = save_checkpoint(&rows, path, reporter) {
                        reporter.report(BatchEvent::warning(format!(
                            "checkpoint at position {} failed: {:#}",
                            i, e
                        )));
                    }
                }
            }
        }

        if i < n && !options.delay.is_zero() {
            tokio::time::sleep(options.delay).await;
        }
    }

    Ok(flatten(slots, queries, reporter))
}

/// Rows for every slot in order, with empty-message rows standing in for
/// gaps so positions stay aligned. Also returns the number of gaps.
fn fill_gaps(
    slots: &[Option<CheckpointRecord>],
    queries: &[String],
) -> (Vec<CheckpointRecord>, usize) {
    let mut missing = 0;
    let rows = slots
        .iter()
        .zip(queries)
        .map(|(slot, query)| match slot {
            Some(row) => row.clone(),
            None => {
                missing += 1;
                CheckpointRecord::new(query.clone(), "")
            }
        })
        .collect();
    (rows, missing)
}

/// Turn the slots into rows, warning once if any position was a gap.
fn flatten(
    slots: Vec<Option<CheckpointRecord>>,
    queries: &[String],
    reporter: &dyn Reporter,
) -> Vec<CheckpointRecord> {
    let (rows, missing) = fill_gaps(&slots, queries);
    if missing > 0 {
        reporter.report(BatchEvent::warning(format!(
            "{} position(s) before the resume index were not in the checkpoint; recorded with empty messages",
            missing
        )));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::save_checkpoint;
    use crate::models::QueryResult;
    use crate::query::QueryError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Answers `answer: <query>` and records every query it sees.
    #[derive(Default)]
    struct Echo {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Searcher for Echo {
        async fn search(
            &self,
            query: &str,
            _mode: OptimizationMode,
            _verbose: bool,
            _reporter: &dyn Reporter,
        ) -> Result<QueryResult, QueryError> {
            self.seen.lock().unwrap().push(query.to_string());
            Ok(QueryResult {
                message: format!("answer: {}", query),
                sources: vec![],
            })
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<BatchEvent>>);

    impl Recorder {
        fn warnings(&self) -> Vec<String> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    BatchEvent::Warning { message } => Some(message.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    impl Reporter for Recorder {
        fn report(&self, event: BatchEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn queries(qs: &[&str]) -> Vec<String> {
        qs.iter().map(|q| q.to_string()).collect()
    }

    fn options() -> BatchOptions {
        BatchOptions {
            delay: Duration::ZERO,
            checkpoint_every: CheckpointCadence::Disabled,
            retry: RetryPolicy::new(0, Duration::ZERO),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_full_run_preserves_order() {
        let echo = Echo::default();
        let rep = Recorder::default();
        let qs = queries(&["alpha", "beta", "gamma"]);

        let rows = run_batch(&echo, &qs, &options(), &rep).await.unwrap();

        assert_eq!(rows.len(), 3);
        for (row, q) in rows.iter().zip(&qs) {
            assert_eq!(&row.query, q);
            assert_eq!(row.message, format!("answer: {}", q));
        }
        assert_eq!(*echo.seen.lock().unwrap(), qs);

        let progress: Vec<_> = rep
            .0
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                BatchEvent::Progress { n, total, .. } => Some((*n, *total)),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let rows = run_batch(&Echo::default(), &[], &options(), &Recorder::default())
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_resume_reuses_checkpoint_prefix() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cp.csv");
        save_checkpoint(
            &[CheckpointRecord::new("q1", "cached answer")],
            &path,
            &Recorder::default(),
        )
        .unwrap();

        let echo = Echo::default();
        let rep = Recorder::default();
        let opts = BatchOptions {
            resume_from: Some(2),
            checkpoint_file: Some(path),
            ..options()
        };
        let rows = run_batch(&echo, &queries(&["q1", "q2"]), &opts, &rep)
            .await
            .unwrap();

        assert_eq!(
            rows,
            vec![
                CheckpointRecord::new("q1", "cached answer"),
                CheckpointRecord::new("q2", "answer: q2"),
            ]
        );
        assert_eq!(*echo.seen.lock().unwrap(), vec!["q2".to_string()]);
        assert!(rep
            .0
            .lock()
            .unwrap()
            .contains(&BatchEvent::CheckpointReused { rows: 1 }));
    }

    #[tokio::test]
    async fn test_resume_matches_by_position_not_text() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cp.csv");
        save_checkpoint(
            &[CheckpointRecord::new("old question", "old answer")],
            &path,
            &Recorder::default(),
        )
        .unwrap();

        let opts = BatchOptions {
            resume_from: Some(2),
            checkpoint_file: Some(path),
            ..options()
        };
        let rows = run_batch(&Echo::default(), &queries(&["new", "q2"]), &opts, &Recorder::default())
            .await
            .unwrap();
        assert_eq!(rows[0], CheckpointRecord::new("old question", "old answer"));
    }

    #[tokio::test]
    async fn test_resume_from_one_is_full_run() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cp.csv");
        save_checkpoint(
            &[CheckpointRecord::new("q1", "cached")],
            &path,
            &Recorder::default(),
        )
        .unwrap();

        let echo = Echo::default();
        let opts = BatchOptions {
            resume_from: Some(1),
            checkpoint_file: Some(path),
            ..options()
        };
        let rows = run_batch(&echo, &queries(&["q1"]), &opts, &Recorder::default())
            .await
            .unwrap();
        assert_eq!(rows[0].message, "answer: q1");
        assert_eq!(echo.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resume_past_short_checkpoint_fills_gaps() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cp.csv");
        save_checkpoint(
            &[CheckpointRecord::new("q1", "cached")],
            &path,
            &Recorder::default(),
        )
        .unwrap();

        let echo = Echo::default();
        let rep = Recorder::default();
        let opts = BatchOptions {
            resume_from: Some(3),
            checkpoint_file: Some(path),
            ..options()
        };
        let rows = run_batch(&echo, &queries(&["q1", "q2", "q3"]), &opts, &rep)
            .await
            .unwrap();

        assert_eq!(
            rows,
            vec![
                CheckpointRecord::new("q1", "cached"),
                CheckpointRecord::new("q2", ""),
                CheckpointRecord::new("q3", "answer: q3"),
            ]
        );
        let warnings = rep.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("1 position(s)"));
    }

    #[tokio::test]
    async fn test_resume_beyond_end_runs_nothing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cp.csv");
        save_checkpoint(
            &[
                CheckpointRecord::new("q1", "a1"),
                CheckpointRecord::new("q2", "a2"),
                CheckpointRecord::new("q3", "a3"),
            ],
            &path,
            &Recorder::default(),
        )
        .unwrap();

        let echo = Echo::default();
        let opts = BatchOptions {
            resume_from: Some(10),
            checkpoint_file: Some(path),
            ..options()
        };
        let rows = run_batch(&echo, &queries(&["q1", "q2"]), &opts, &Recorder::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].message, "a2");
        assert!(echo.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_checkpoint_written_at_cadence() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cp.csv");
        let rep = Recorder::default();
        let opts = BatchOptions {
            checkpoint_every: CheckpointCadence::every(2),
            checkpoint_file: Some(path.clone()),
            ..options()
        };

        run_batch(&Echo::default(), &queries(&["q1", "q2"]), &opts, &rep)
            .await
            .unwrap();

        let saved = load_checkpoint(&path).unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[1], CheckpointRecord::new("q2", "answer: q2"));
        assert!(rep.warnings().is_empty());
    }

    #[tokio::test]
    async fn test_checkpoint_holds_prefix_between_saves() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cp.csv");
        let opts = BatchOptions {
            checkpoint_every: CheckpointCadence::every(2),
            checkpoint_file: Some(path.clone()),
            ..options()
        };

        run_batch(
            &Echo::default(),
            &queries(&["q1", "q2", "q3"]),
            &opts,
            &Recorder::default(),
        )
        .await
        .unwrap();

        // Position 3 is not a multiple of 2, so the last snapshot is from position 2.
        assert_eq!(load_checkpoint(&path).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cadence_without_path_warns_once() {
        let rep = Recorder::default();
        let opts = BatchOptions {
            checkpoint_every: CheckpointCadence::every(1),
            ..options()
        };

        let rows = run_batch(&Echo::default(), &queries(&["q1", "q2", "q3"]), &opts, &rep)
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);
        let warnings = rep.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("no checkpoint_file"));
        assert!(!rep
            .0
            .lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, BatchEvent::CheckpointSaved { .. })));
    }

    #[tokio::test]
    async fn test_disabled_cadence_never_writes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cp.csv");
        let opts = BatchOptions {
            checkpoint_file: Some(path.clone()),
            ..options()
        };
        run_batch(&Echo::default(), &queries(&["q1", "q2"]), &opts, &Recorder::default())
            .await
            .unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_checkpoint_after_gappy_resume_stays_aligned() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cp.csv");
        let qs = queries(&["q1", "q2", "q3", "q4", "q5", "q6"]);

        // No checkpoint exists yet, so positions 1 and 2 are gaps.
        let first = BatchOptions {
            resume_from: Some(3),
            checkpoint_every: CheckpointCadence::every(2),
            checkpoint_file: Some(path.clone()),
            ..options()
        };
        run_batch(&Echo::default(), &qs, &first, &Recorder::default())
            .await
            .unwrap();

        let saved = load_checkpoint(&path).unwrap();
        assert_eq!(saved.len(), 6);
        assert_eq!(saved[0], CheckpointRecord::new("q1", ""));
        assert_eq!(saved[2], CheckpointRecord::new("q3", "answer: q3"));

        let echo = Echo::default();
        let second = BatchOptions {
            resume_from: Some(5),
            checkpoint_file: Some(path),
            ..options()
        };
        let rows = run_batch(&echo, &qs, &second, &Recorder::default())
            .await
            .unwrap();

        let texts: Vec<_> = rows.iter().map(|r| r.query.as_str()).collect();
        assert_eq!(texts, vec!["q1", "q2", "q3", "q4", "q5", "q6"]);
        assert_eq!(rows[2].message, "answer: q3");
        assert_eq!(rows[3].message, "answer: q4");
        assert_eq!(
            *echo.seen.lock().unwrap(),
            vec!["q5".to_string(), "q6".to_string()]
        );
    }

    #[tokio::test]
    async fn test_failed_checkpoint_save_warns_and_continues() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, "plain file").unwrap();

        let rep = Recorder::default();
        let opts = BatchOptions {
            checkpoint_every: CheckpointCadence::every(2),
            checkpoint_file: Some(blocker.join("cp.csv")),
            ..options()
        };
        let rows = run_batch(&Echo::default(), &queries(&["q1", "q2", "q3"]), &opts, &rep)
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], CheckpointRecord::new("q3", "answer: q3"));
        let warnings = rep.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("checkpoint at position 2"), "{}", warnings[0]);
    }
}
