//! TOML configuration and the remote endpoint value.
//!
//! Every section is optional; a missing file at the default path yields
//! [`Config::default`]. CLI flags override individual values after loading.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::models::OptimizationMode;

/// Address of a local Perplexica instance.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub models: ModelsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default)]
    pub mode: OptimizationMode,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            mode: OptimizationMode::default(),
            max_retries: default_max_retries(),
            backoff_unit_ms: default_backoff_unit_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}
fn default_backoff_unit_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct BatchConfig {
    #[serde(default = "default_delay_secs")]
    pub delay_secs: f64,
    #[serde(default)]
    pub checkpoint_every: CheckpointCadence,
    #[serde(default)]
    pub checkpoint_file: Option<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            delay_secs: default_delay_secs(),
            checkpoint_every: CheckpointCadence::default(),
            checkpoint_file: None,
        }
    }
}

fn default_delay_secs() -> f64 {
    1.0
}

/// Optional pins applied during model discovery.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ModelsConfig {
    pub chat_provider: Option<String>,
    pub chat_model: Option<String>,
    pub embedding_provider: Option<String>,
    pub embedding_model: Option<String>,
}

/// How often the batch runner writes a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointCadence {
    /// After every `n`th query (1-based position divisible by `n`).
    Every(NonZeroUsize),
    Disabled,
}

impl CheckpointCadence {
    pub fn every(n: usize) -> Self {
        NonZeroUsize::new(n)
            .map(CheckpointCadence::Every)
            .unwrap_or(CheckpointCadence::Disabled)
    }

    /// Whether position `i` (1-based) is a checkpoint position.
    pub fn is_due(&self, i: usize) -> bool {
        match self {
            CheckpointCadence::Every(n) => i % n.get() == 0,
            CheckpointCadence::Disabled => false,
        }
    }
}

impl Default for CheckpointCadence {
    fn default() -> Self {
        CheckpointCadence::every(10)
    }
}

impl fmt::Display for CheckpointCadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointCadence::Every(n) => write!(f, "{}", n),
            CheckpointCadence::Disabled => f.write_str("disabled"),
        }
    }
}

impl FromStr for CheckpointCadence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("disabled") {
            return Ok(CheckpointCadence::Disabled);
        }
        match s.parse::<usize>() {
            Ok(0) => Err("checkpoint_every must be > 0 (use \"disabled\" to turn it off)".into()),
            Ok(n) => Ok(CheckpointCadence::every(n)),
            Err(_) => Err(format!(
                "invalid checkpoint_every '{}': expected a positive integer or \"disabled\"",
                s
            )),
        }
    }
}

impl<'de> Deserialize<'de> for CheckpointCadence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Count(i64),
            Word(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Count(n) if n > 0 => Ok(CheckpointCadence::every(n as usize)),
            Raw::Count(n) => Err(serde::de::Error::custom(format!(
                "checkpoint_every must be > 0, got {}",
                n
            ))),
            Raw::Word(w) => w.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// The remote instance every component talks to.
///
/// Constructed once per run and passed into each component; changing
/// instance means building a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base_url: String,
    timeout: Duration,
}

impl Endpoint {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, timeout }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn search_url(&self) -> String {
        format!("{}/api/search", self.base_url)
    }

    pub fn providers_url(&self) -> String {
        format!("{}/api/providers", self.base_url)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::new(DEFAULT_BASE_URL, Duration::from_secs(default_timeout_secs()))
    }
}

impl Config {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(
            self.server.base_url.clone(),
            Duration::from_secs(self.server.timeout_secs),
        )
    }

    pub fn delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.batch.delay_secs).unwrap_or(Duration::MAX)
    }

    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.search.backoff_unit_ms)
    }

    /// Check values serde cannot express as types.
    pub fn validate(&self) -> Result<()> {
        let url = &self.server.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("server.base_url must start with http:// or https://, got '{}'", url);
        }
        if self.server.timeout_secs == 0 {
            anyhow::bail!("server.timeout_secs must be > 0");
        }
        if Duration::try_from_secs_f64(self.batch.delay_secs).is_err() {
            anyhow::bail!(
                "batch.delay_secs must be a non-negative number of seconds, got {}",
                self.batch.delay_secs
            );
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}
