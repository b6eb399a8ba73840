//! Bounded retries with linear backoff.
//!
//! Attempt `k` (1-based) that yields an error or an empty answer is followed
//! by a wait of `5 × k` backoff units, unless it was the last allowed
//! attempt. With `max_retries = R` there are at most `R + 1` attempts.
//!
//! [`RetryingExecutor::run`] returns a bare [`QueryResult`]: every failure
//! is absorbed here and surfaces only as an empty `message`.

use std::time::Duration;

use crate::models::{OptimizationMode, QueryResult};
use crate::progress::{BatchEvent, Reporter};
use crate::query::Searcher;

/// Backoff multiplier applied per attempt number.
const BACKOFF_FACTOR: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_unit: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_unit: Duration) -> Self {
        Self {
            max_retries,
            backoff_unit,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait after a failed `attempt` (1-based). Saturates at `Duration::MAX`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_unit
            .checked_mul(BACKOFF_FACTOR.saturating_mul(attempt))
            .unwrap_or(Duration::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

pub struct RetryingExecutor<'a, S: Searcher + ?Sized> {
    searcher: &'a S,
    policy: RetryPolicy,
    reporter: &'a dyn Reporter,
}

impl<'a, S: Searcher + ?Sized> RetryingExecutor<'a, S> {
    pub fn new(searcher: &'a S, policy: RetryPolicy, reporter: &'a dyn Reporter) -> Self {
        Self {
            searcher,
            policy,
            reporter,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Search `query` until an answer arrives or attempts run out.
    pub async fn run(&self, query: &str, mode: OptimizationMode, verbose: bool) -> QueryResult {
        let total = self.policy.max_attempts();
        let mut attempt = 1;

        loop {
            // Only the first attempt announces the query itself.
            let announce = verbose && attempt == 1;
            let result = match self
                .searcher
                .search(query, mode, announce, self.reporter)
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    if verbose {
                        self.reporter.report(BatchEvent::AttemptFailed {
                            attempt,
                            reason: e.to_string(),
                        });
                    }
                    QueryResult::empty()
                }
            };

            if result.has_answer() || attempt >= total {
                return result;
            }

            if verbose {
                self.reporter.report(BatchEvent::Retrying {
                    attempt: attempt + 1,
                    total,
                });
            }
            let wait = self.policy.backoff(attempt);
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
            attempt += 1;
        }
    }
}
