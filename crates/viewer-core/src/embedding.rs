use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Ollama API error: {0}")]
    ApiError(String),
}

/// Turns query text into a vector. The Chroma server only accepts
/// precomputed query embeddings, so both connectors need one of these.
#[allow(async_fn_in_trait)]
pub trait Embedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

#[derive(Deserialize, Debug)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

pub struct OllamaClient {
    client: Client,
    ollama_url: String,
    embedding_model: String,
}

impl OllamaClient {
    pub fn new(ollama_url: String, embedding_model: String) -> Self {
        Self {
            client: Client::new(),
            ollama_url: ollama_url.trim_end_matches('/').to_string(),
            embedding_model,
        }
    }

    pub async fn get_embedding(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        tracing::debug!(model = %self.embedding_model, "requesting embedding");
        let response = self
            .client
            .post(format!("{}/api/embeddings", self.ollama_url))
            .json(&json!({
                "model": self.embedding_model,
                "prompt": text
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiError(format!(
                "Ollama API request failed ({}): {}",
                status, error_text
            )));
        }
        let embedding_response = response.json::<EmbeddingResponse>().await?;
        if embedding_response.embedding.is_empty() {
            return Err(EmbeddingError::ApiError(format!(
                "model '{}' returned an empty embedding",
                self.embedding_model
            )));
        }
        Ok(embedding_response.embedding)
    }
}

impl Embedder for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.get_embedding(text).await
    }
}
