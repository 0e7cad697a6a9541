use crate::config::EmbeddingConfig;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Result of asking the embedding service for a vector.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingOutcome {
    Vector(Vec<f32>),
    Unavailable(String),
}

#[async_trait::async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> EmbeddingOutcome;

    /// Clients that can never produce a vector let callers skip the round trip.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Stand-in used when no embedding credential is configured.
#[derive(Debug, Clone, Default)]
pub struct DisabledEmbeddingClient;

#[async_trait::async_trait]
impl EmbeddingClient for DisabledEmbeddingClient {
    async fn embed(&self, _text: &str) -> EmbeddingOutcome {
        EmbeddingOutcome::Unavailable("embedding service not configured".to_string())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
#[derive(Clone)]
pub struct HttpEmbeddingClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpEmbeddingClient {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    fn headers(&self) -> Result<HeaderMap, String> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(ref api_key) = self.api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {api_key}"))
                    .map_err(|e| format!("invalid API key header: {e}"))?,
            );
        }
        Ok(headers)
    }
}

#[async_trait::async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> EmbeddingOutcome {
        let headers = match self.headers() {
            Ok(headers) => headers,
            Err(reason) => return EmbeddingOutcome::Unavailable(reason),
        };

        let request = EmbeddingRequest {
            model: &self.model,
            input: vec![text],
        };
        let url = format!("{}/embeddings", self.base_url);

        let response = match self.client.post(&url).headers(headers).json(&request).send().await {
            Ok(resp) => resp,
            Err(e) => return EmbeddingOutcome::Unavailable(format!("request failed: {e}")),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return EmbeddingOutcome::Unavailable(format!("API error {status}: {body}"));
        }

        match response.json::<EmbeddingResponse>().await {
            Ok(body) => match body.data.into_iter().next() {
                Some(data) if !data.embedding.is_empty() => {
                    debug!(dimensions = data.embedding.len(), "Received embedding");
                    EmbeddingOutcome::Vector(data.embedding)
                }
                _ => EmbeddingOutcome::Unavailable("empty embedding response".to_string()),
            },
            Err(e) => EmbeddingOutcome::Unavailable(format!("failed to parse response: {e}")),
        }
    }
}

/// Picks the HTTP client when a credential is configured, otherwise the disabled one.
pub fn from_config(config: &EmbeddingConfig) -> Arc<dyn EmbeddingClient> {
    if !config.is_usable() {
        debug!("Embedding service not configured, similarity uses tag matching");
        return Arc::new(DisabledEmbeddingClient);
    }

    match HttpEmbeddingClient::new(config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            warn!("Failed to create embedding client, falling back to tag matching: {}", e);
            Arc::new(DisabledEmbeddingClient)
        }
    }
}
