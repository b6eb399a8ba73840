//! # Perplexica Batch
//!
//! A client for synthesised, source-backed answers from a Perplexica search
//! API, built for long-running batches of independent queries.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌───────────────┐   ┌────────────┐
//! │ BatchRunner │──▶│ RetryingExecutor │──▶│ QueryExecutor │──▶│ /api/search│
//! └──────┬──────┘   └──────────────────┘   └───────────────┘   └────────────┘
//!        │
//!        ▼
//! ┌─────────────────┐
//! │ CheckpointStore │  query,message CSV
//! └─────────────────┘
//! ```
//!
//! Queries run strictly one at a time. Failures and empty answers are retried
//! with linear backoff and never abort the batch; completed rows are
//! checkpointed so an interrupted run can resume where it stopped.
//!
//! ## Quick Start
//!
//! ```bash
//! pxb providers                                   # what the instance offers
//! pxb search "What is the capital of France?"
//! pxb batch queries.txt --checkpoint-file cp.csv --output answers.csv
//! pxb batch queries.txt --checkpoint-file cp.csv --resume-from 41 --output answers.csv
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and the endpoint value |
//! | [`models`] | Request, response, and result types |
//! | [`providers`] | Model discovery |
//! | [`query`] | Single search request |
//! | [`retry`] | Bounded retries with backoff |
//! | [`checkpoint`] | CSV checkpoint snapshots |
//! | [`batch`] | Sequential checkpointed batches |
//! | [`progress`] | Progress and warning reporting |
//! | [`queries`] | Query file loading |

pub mod batch;
pub mod checkpoint;
pub mod commands;
pub mod config;
pub mod models;
pub mod progress;
pub mod providers;
pub mod queries;
pub mod query;
pub mod retry;
