//! Model discovery.
//!
//! Asks the remote instance which providers and models it has configured
//! (`GET /api/providers`) and picks the chat and embedding models that every
//! search request will carry. Pins from the `[models]` config section narrow
//! the choice; without pins the first provider offering a model wins.
//!
//! A discovery failure is a setup problem, not a transient one: callers get
//! the error straight back and nothing is retried.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::{Endpoint, ModelsConfig};
use crate::models::{ModelRef, ModelSelection};

/// A model as listed by the remote instance.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ModelInfo {
    #[serde(default)]
    pub name: String,
    pub key: String,
}

/// A provider and the models it exposes.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub chat_models: Vec<ModelInfo>,
    #[serde(default)]
    pub embedding_models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ProvidersResponse {
    #[serde(default)]
    providers: Vec<ProviderInfo>,
}

/// Source of the model selection injected into search requests.
#[async_trait]
pub trait ModelSource: Send + Sync {
    async fn select(&self, endpoint: &Endpoint) -> Result<ModelSelection>;
}

/// A selection known up front; no network call.
pub struct FixedModels(pub ModelSelection);

#[async_trait]
impl ModelSource for FixedModels {
    async fn select(&self, _endpoint: &Endpoint) -> Result<ModelSelection> {
        Ok(self.0.clone())
    }
}

/// Discovers models from the remote instance, honouring config pins.
pub struct ProviderDiscovery {
    pins: ModelsConfig,
}

impl ProviderDiscovery {
    pub fn new(pins: ModelsConfig) -> Self {
        Self { pins }
    }
}

#[async_trait]
impl ModelSource for ProviderDiscovery {
    async fn select(&self, endpoint: &Endpoint) -> Result<ModelSelection> {
        let providers = list_providers(endpoint).await?;
        select_models(&providers, &self.pins)
    }
}

/// Fetch the provider list from `GET /api/providers`.
pub async fn list_providers(endpoint: &Endpoint) -> Result<Vec<ProviderInfo>> {
    let client = reqwest::Client::builder()
        .timeout(endpoint.timeout())
        .build()?;

    let url = endpoint.providers_url();
    let response = client.get(&url).send().await.with_context(|| {
        format!(
            "Could not reach {} (is Perplexica running at {}?)",
            url,
            endpoint.base_url()
        )
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("Provider discovery failed with status {}: {}", status, body);
    }

    let parsed: ProvidersResponse = response
        .json()
        .await
        .with_context(|| format!("Invalid provider list from {}", url))?;

    Ok(parsed.providers)
}

/// Choose chat and embedding models from `providers`.
pub fn select_models(providers: &[ProviderInfo], pins: &ModelsConfig) -> Result<ModelSelection> {
    let chat = pick(
        providers,
        pins.chat_provider.as_deref(),
        pins.chat_model.as_deref(),
        |p| &p.chat_models,
    )
    .context("No usable chat model available")?;

    let embedding = pick(
        providers,
        pins.embedding_provider.as_deref(),
        pins.embedding_model.as_deref(),
        |p| &p.embedding_models,
    )
    .context("No usable embedding model available")?;

    Ok(ModelSelection { chat, embedding })
}

fn pick(
    providers: &[ProviderInfo],
    provider_pin: Option<&str>,
    model_pin: Option<&str>,
    models_of: impl Fn(&ProviderInfo) -> &Vec<ModelInfo>,
) -> Result<ModelRef> {
    let candidates = providers
        .iter()
        .filter(|p| provider_pin.map_or(true, |pin| p.id == pin || p.name == pin));

    for provider in candidates {
        let models = models_of(provider);
        let found = match model_pin {
            Some(pin) => models.iter().find(|m| m.key == pin),
            None => models.first(),
        };
        if let Some(model) = found {
            return Ok(ModelRef {
                provider_id: provider.id.clone(),
                key: model.key.clone(),
            });
        }
    }

    match (provider_pin, model_pin) {
        (Some(p), Some(m)) => bail!("model '{}' not offered by provider '{}'", m, p),
        (Some(p), None) => bail!("provider '{}' not found or offers no models", p),
        (None, Some(m)) => bail!("no provider offers model '{}'", m),
        (None, None) => bail!("the instance has no providers with models configured"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(key: &str) -> ModelInfo {
        ModelInfo {
            name: key.to_uppercase(),
            key: key.to_string(),
        }
    }

    fn providers() -> Vec<ProviderInfo> {
        vec![
            ProviderInfo {
                id: "transformers".into(),
                name: "Transformers".into(),
                chat_models: vec![],
                embedding_models: vec![model("xenova-bge")],
            },
            ProviderInfo {
                id: "ollama-1".into(),
                name: "Ollama".into(),
                chat_models: vec![model("llama3"), model("qwen2")],
                embedding_models: vec![model("nomic-embed")],
            },
        ]
    }

    #[test]
    fn test_first_available_models() {
        let sel = select_models(&providers(), &ModelsConfig::default()).unwrap();
        assert_eq!(sel.chat.provider_id, "ollama-1");
        assert_eq!(sel.chat.key, "llama3");
        assert_eq!(sel.embedding.provider_id, "transformers");
        assert_eq!(sel.embedding.key, "xenova-bge");
    }

    #[test]
    fn test_pinned_models() {
        let pins = ModelsConfig {
            chat_model: Some("qwen2".into()),
            embedding_provider: Some("Ollama".into()),
            ..Default::default()
        };
        let sel = select_models(&providers(), &pins).unwrap();
        assert_eq!(sel.chat.key, "qwen2");
        assert_eq!(sel.embedding.provider_id, "ollama-1");
        assert_eq!(sel.embedding.key, "nomic-embed");
    }

    #[test]
    fn test_no_providers_is_error() {
        let err = select_models(&[], &ModelsConfig::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("No usable chat model"));
    }

    #[test]
    fn test_unknown_pin_is_error() {
        let pins = ModelsConfig {
            chat_model: Some("gpt-5".into()),
            ..Default::default()
        };
        let err = select_models(&providers(), &pins).unwrap_err();
        assert!(format!("{:#}", err).contains("gpt-5"));
    }

    #[test]
    fn test_parse_provider_list() {
        let body = r#"{"providers":[{"id":"abc","name":"OpenAI",
            "chatModels":[{"name":"GPT 4o","key":"gpt-4o"}],
            "embeddingModels":[{"name":"Small","key":"text-embedding-3-small"}]}]}"#;
        let parsed: ProvidersResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.providers.len(), 1);
        assert_eq!(parsed.providers[0].chat_models[0].key, "gpt-4o");
    }
}
