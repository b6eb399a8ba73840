//! Core data models used throughout the batch client.
//!
//! These types represent the outbound search request, the inbound response,
//! and the normalized results and checkpoint rows that flow through the
//! retry and batch layers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Optimisation hint sent with every search request.
///
/// Trades answer quality against latency on the remote side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationMode {
    Speed,
    #[default]
    Balanced,
}

impl OptimizationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationMode::Speed => "speed",
            OptimizationMode::Balanced => "balanced",
        }
    }
}

impl fmt::Display for OptimizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "speed" => Ok(OptimizationMode::Speed),
            "balanced" => Ok(OptimizationMode::Balanced),
            other => Err(format!(
                "unknown optimization mode '{}'. Must be speed or balanced.",
                other
            )),
        }
    }
}

/// A provider-qualified model reference, as the remote API expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRef {
    pub provider_id: String,
    pub key: String,
}

/// Chat and embedding models chosen by the discovery collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub chat: ModelRef,
    pub embedding: ModelRef,
}

/// Body of `POST /api/search`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest<'a> {
    pub chat_model: &'a ModelRef,
    pub embedding_model: &'a ModelRef,
    pub optimization_mode: OptimizationMode,
    pub sources: [&'static str; 1],
    pub query: &'a str,
    pub stream: bool,
}

impl<'a> SearchRequest<'a> {
    /// Non-streaming web search for `query`.
    pub fn web(query: &'a str, mode: OptimizationMode, models: &'a ModelSelection) -> Self {
        Self {
            chat_model: &models.chat,
            embedding_model: &models.embedding,
            optimization_mode: mode,
            sources: ["web"],
            query,
            stream: false,
        }
    }
}

/// Body returned by `POST /api/search`.
///
/// Every field is optional on the wire; absent fields deserialize to their
/// documented defaults so that "missing" is an explicit branch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub sources: Option<Vec<SourceEntry>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceEntry {
    #[serde(default)]
    pub metadata: Option<SourceMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceMetadata {
    #[serde(default)]
    pub url: Option<String>,
}

/// The uniform outcome of attempting one query.
///
/// An empty `message` means "no usable answer", whatever the cause.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    pub message: String,
    pub sources: Vec<String>,
}

impl QueryResult {
    /// The "no usable answer" outcome.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_answer(&self) -> bool {
        !self.message.is_empty()
    }
}

impl From<SearchResponse> for QueryResult {
    fn from(resp: SearchResponse) -> Self {
        let sources = resp
            .sources
            .unwrap_or_default()
            .into_iter()
            .map(|entry| entry.metadata.and_then(|m| m.url).unwrap_or_default())
            .filter(|url| !url.is_empty())
            .collect();

        Self {
            message: resp.message.unwrap_or_default(),
            sources,
        }
    }
}

/// One row of durable batch progress. Sources are not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub query: String,
    pub message: String,
}

impl CheckpointRecord {
    pub fn new(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            message: message.into(),
        }
    }
}
