//! In-process mock of the Perplexica API used by the integration tests.

#![allow(dead_code)]

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// What the mock answers to `POST /api/search`.
#[derive(Clone)]
pub enum Reply {
    Json(Value),
    Status(u16),
    Raw(&'static str),
}

#[derive(Default)]
struct Inner {
    replies: Vec<Reply>,
    bodies: Vec<Value>,
    providers: Option<Value>,
}

#[derive(Clone, Default)]
pub struct MockApi {
    inner: Arc<Mutex<Inner>>,
}

impl MockApi {
    /// Replies are used in order; the last one repeats.
    pub fn new(replies: Vec<Reply>) -> Self {
        let api = Self::default();
        api.inner.lock().unwrap().replies = replies;
        api
    }

    pub fn with_providers(self, providers: Value) -> Self {
        self.inner.lock().unwrap().providers = Some(providers);
        self
    }

    pub fn calls(&self) -> usize {
        self.inner.lock().unwrap().bodies.len()
    }

    pub fn bodies(&self) -> Vec<Value> {
        self.inner.lock().unwrap().bodies.clone()
    }

    /// Serve on an ephemeral port; returns the base URL.
    pub async fn serve(&self) -> String {
        let app = Router::new()
            .route("/api/search", post(search))
            .route("/api/providers", get(providers))
            .with_state(self.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }
}

pub fn default_providers() -> Value {
    json!({
        "providers": [{
            "id": "prov-1",
            "name": "Ollama",
            "chatModels": [{ "name": "Llama 3", "key": "llama3" }],
            "embeddingModels": [{ "name": "Nomic", "key": "nomic-embed-text" }]
        }]
    })
}

async fn search(State(api): State<MockApi>, Json(body): Json<Value>) -> Response {
    let reply = {
        let mut inner = api.inner.lock().unwrap();
        let idx = inner.bodies.len().min(inner.replies.len().saturating_sub(1));
        inner.bodies.push(body);
        inner.replies.get(idx).cloned()
    };

    match reply {
        Some(Reply::Json(v)) => Json(v).into_response(),
        Some(Reply::Status(code)) => StatusCode::from_u16(code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
        Some(Reply::Raw(text)) => text.into_response(),
        None => Json(json!({})).into_response(),
    }
}

async fn providers(State(api): State<MockApi>) -> Response {
    let providers = api.inner.lock().unwrap().providers.clone();
    match providers {
        Some(v) => Json(v).into_response(),
        None => Json(default_providers()).into_response(),
    }
}
