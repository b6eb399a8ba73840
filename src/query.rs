//! Single-query execution against `POST /api/search`.
//!
//! [`QueryExecutor`] performs exactly one round trip per call and maps the
//! response into a [`QueryResult`]. It does not retry and it does not
//! swallow failures: transport errors, non-2xx statuses, and malformed
//! bodies come back as a [`QueryError`] for the retry layer to absorb.

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::config::Endpoint;
use crate::models::{ModelSelection, OptimizationMode, QueryResult, SearchRequest, SearchResponse};
use crate::progress::{BatchEvent, Reporter};
use crate::providers::ModelSource;

/// Why a single search attempt produced no result.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("search API returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("malformed search response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Performs one search. Implemented by [`QueryExecutor`]; the retry and
/// batch layers only see this trait.
#[async_trait]
pub trait Searcher: Send + Sync {
    async fn search(
        &self,
        query: &str,
        mode: OptimizationMode,
        verbose: bool,
        reporter: &dyn Reporter,
    ) -> Result<QueryResult, QueryError>;
}

/// HTTP client bound to one endpoint and one model selection.
pub struct QueryExecutor {
    client: reqwest::Client,
    endpoint: Endpoint,
    models: ModelSelection,
}

impl QueryExecutor {
    pub fn new(endpoint: Endpoint, models: ModelSelection) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(endpoint.timeout())
            .build()?;
        Ok(Self {
            client,
            endpoint,
            models,
        })
    }

    /// Resolve models through `source`, then build the executor.
    ///
    /// Discovery errors are returned unchanged.
    pub async fn connect(endpoint: Endpoint, source: &dyn ModelSource) -> anyhow::Result<Self> {
        let models = source.select(&endpoint).await?;
        Self::new(endpoint, models)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn models(&self) -> &ModelSelection {
        &self.models
    }
}

#[async_trait]
impl Searcher for QueryExecutor {
    async fn search(
        &self,
        query: &str,
        mode: OptimizationMode,
        verbose: bool,
        reporter: &dyn Reporter,
    ) -> Result<QueryResult, QueryError> {
        if verbose {
            reporter.report(BatchEvent::QuerySent {
                query: query.to_string(),
            });
        }

        let body = SearchRequest::web(query, mode, &self.models);
        let response = self
            .client
            .post(self.endpoint.search_url())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(QueryError::Status { status, body: text });
        }

        parse_search_response(&text)
    }
}

/// Decode a search response body into a [`QueryResult`].
pub fn parse_search_response(body: &str) -> Result<QueryResult, QueryError> {
    let parsed: SearchResponse = serde_json::from_str(body)?;
    Ok(parsed.into())
}
