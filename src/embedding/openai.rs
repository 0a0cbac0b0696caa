//! OpenAI embedding provider client

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::Embedder;
use crate::constants::EMBEDDING_DIM;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

/// Embedder backed by the OpenAI embeddings endpoint.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self::with_base(OPENAI_API_BASE, api_key, model)
    }

    /// Point at a custom API base (OpenAI-compatible servers, test doubles).
    pub fn with_base(api_base: &str, api_key: &str, model: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>, String> {
        let url = format!("{}/embeddings", self.api_base);
        let body = EmbeddingRequest {
            model: &self.model,
            input: text,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("HTTP request failed: {e}"))?;

        if !response.status().is_success() {
            return Err(format!("API returned status: {}", response.status()));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse response: {e}"))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| "Empty embedding response".to_string())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            tracing::debug!("Skipping embedding: empty text");
            return None;
        }

        match self.request(trimmed).await {
            Ok(vector) => Some(vector),
            Err(reason) => {
                tracing::warn!(%reason, "Embedding generation failed, continuing without vector");
                None
            }
        }
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }
}
