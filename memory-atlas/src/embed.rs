//! Text embedding capability.
//!
//! Search treats embedding as `embed(text) -> Option<vector>`: providers never
//! raise, they return `None` when unavailable so the caller can fall back to
//! text matching.
//!
//! # Configuration
//!
//! [`HttpEmbedder`] reads its endpoint from [`EmbedderConfig`]:
//! - `ATLAS_EMBED_ENDPOINT`: embedding server (default: "http://localhost:5001")
//! - `ATLAS_EMBED_TIMEOUT_SECS`: request timeout (default: 10)

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EmbedderConfig;
use crate::error::{AtlasError, Result};

/// Converts text into an embedding vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `text`, or `None` when the provider cannot answer.
    async fn embed(&self, text: &str) -> Option<Vec<f32>>;

    /// Short provider name for logs.
    fn name(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Client for an embedding server speaking `POST {"text"}` → `{"embedding"}`.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    config: EmbedderConfig,
    http: Client,
}

impl HttpEmbedder {
    pub fn new(config: EmbedderConfig) -> Result<Self> {
        if config.endpoint.is_empty() {
            return Err(AtlasError::InvalidConfig(
                "embedding endpoint cannot be empty".to_string(),
            ));
        }

        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AtlasError::Embedding(e.to_string()))?;

        Ok(Self { config, http })
    }

    /// Create a client from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(EmbedderConfig::from_env())
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .http
            .post(&self.config.endpoint)
            .json(&EmbedRequest { text })
            .send()
            .await
            .map_err(|e| AtlasError::Embedding(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AtlasError::Embedding(format!(
                "server returned {}",
                response.status()
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| AtlasError::Embedding(format!("malformed response: {e}")))?;
        if body.embedding.is_empty() {
            return Err(AtlasError::Embedding("empty embedding".to_string()));
        }
        Ok(body.embedding)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        if text.trim().is_empty() {
            return None;
        }

        match self.request(text).await {
            Ok(vector) => {
                debug!(endpoint = %self.config.endpoint, dim = vector.len(), "query embedded");
                Some(vector)
            }
            Err(e) => {
                warn!(endpoint = %self.config.endpoint, error = %e, "embedding request failed");
                None
            }
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Provider that is never available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEmbedder;

#[async_trait]
impl Embedder for NullEmbedder {
    async fn embed(&self, _text: &str) -> Option<Vec<f32>> {
        None
    }

    fn name(&self) -> &str {
        "null"
    }
}

/// Provider that answers every query with the same vector.
#[derive(Debug, Clone, Default)]
pub struct StaticEmbedder {
    vector: Vec<f32>,
}

impl StaticEmbedder {
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }
}

#[async_trait]
impl Embedder for StaticEmbedder {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        if text.trim().is_empty() || self.vector.is_empty() {
            None
        } else {
            Some(self.vector.clone())
        }
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Tries each provider in order and returns the first vector.
#[derive(Clone, Default)]
pub struct EmbedderChain {
    providers: Vec<Arc<dyn Embedder>>,
}

impl std::fmt::Debug for EmbedderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("EmbedderChain")
            .field("providers", &names)
            .finish()
    }
}

impl EmbedderChain {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn Embedder>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl Embedder for EmbedderChain {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        for provider in &self.providers {
            if let Some(vector) = provider.embed(text).await {
                return Some(vector);
            }
            debug!(provider = provider.name(), "provider unavailable, trying next");
        }
        None
    }

    fn name(&self) -> &str {
        "chain"
    }
}
