// src/recommendation/embeddings.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::ServiceClient;

const EMBED_ENDPOINT: &str = "/api/embed";

/// Turns text into dense vectors. One vector per input, in input order.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn model_name(&self) -> &str;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .context("Embedding service returned no vector")
    }
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    model: &'a str,
    #[serde(rename = "input")]
    inputs: &'a [String],
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Ollama `/api/embed` client.
pub struct OllamaEmbeddingClient {
    client: ServiceClient,
    model: String,
    batch_size: usize,
}

impl OllamaEmbeddingClient {
    pub fn new(client: ServiceClient, model: impl Into<String>, batch_size: usize) -> Self {
        Self {
            client,
            model: model.into(),
            batch_size: batch_size.max(1),
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        debug!("Embedding batch of {} texts with {}", texts.len(), self.model);

        let request = BatchEmbedRequest {
            model: &self.model,
            inputs: texts,
        };
        let response: BatchEmbedResponse = self
            .client
            .post_json(EMBED_ENDPOINT, &request)
            .await
            .context("Failed to generate batch embeddings")?;

        if response.embeddings.len() != texts.len() {
            anyhow::bail!(
                "Embedding count mismatch: expected {}, got {}",
                texts.len(),
                response.embeddings.len()
            );
        }
        Ok(response.embeddings)
    }
}

#[async_trait]
impl EmbeddingModel for OllamaEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let batch_vectors = self
                .embed_batch(batch)
                .await
                .with_context(|| format!("Failed to process batch of {} texts", batch.len()))?;
            vectors.extend(batch_vectors);
        }

        info!("Generated {} embeddings with {}", vectors.len(), self.model);
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
