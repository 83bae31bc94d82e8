//! HTTP-served `EmbeddingProvider` adapter (§6).
//!
//! Dense embedding models ship behind the same model-serving endpoints as
//! the generator (Ollama's `/api/embeddings`, or an OpenAI-compatible
//! `/embeddings` endpoint); this adapter speaks the Ollama wire format,
//! which the reference deployment uses for both.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use horei_core::{EmbeddingProvider, Error as CoreError};

use crate::backend::LlmConfig;
use crate::LlmError;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    config: LlmConfig,
    dim: usize,
}

impl OllamaEmbeddingProvider {
    pub fn new(config: LlmConfig, dim: usize) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(e.to_string()))?;
        Ok(Self { client, config, dim })
    }

    fn api_url(&self) -> String {
        format!("{}/api/embed", self.config.endpoint.trim_end_matches('/'))
    }

    async fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, LlmError> {
        let request = EmbedRequest {
            model: &self.config.model,
            input: texts,
        };

        let response = self.client.post(self.api_url()).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CoreError> {
        let mut vectors = self.embed_texts(&[text]).await.map_err(CoreError::from)?;
        vectors
            .pop()
            .ok_or_else(|| LlmError::InvalidResponse("empty embeddings array".to_string()).into())
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CoreError> {
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        self.embed_texts(&refs).await.map_err(CoreError::from)
    }

    fn dim(&self) -> usize {
        self.dim
    }
}
