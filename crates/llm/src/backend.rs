//! HTTP-based `LLMProvider` adapters: Ollama-native and OpenAI-compatible
//! chat completion backends (§4.8).
//!
//! Single-shot `generate` only: the pipeline issues exactly one completion
//! call per chat request, so the teacher's streaming/session-KV-cache
//! machinery has no counterpart here and is left out.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use horei_core::{Error as CoreError, GenerationParams, LLMProvider, LlmMessage, LlmRole};

use crate::LlmError;

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            api_key: None,
            model: "qwen3:8b".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

fn role_str(role: LlmRole) -> &'static str {
    match role {
        LlmRole::System => "system",
        LlmRole::User => "user",
        LlmRole::Assistant => "assistant",
    }
}

/// Ollama's `/api/chat` backend, non-streaming.
pub struct OllamaBackend {
    client: reqwest::Client,
    config: LlmConfig,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: usize,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

impl OllamaBackend {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn api_url(&self) -> String {
        format!("{}/api/chat", self.config.endpoint.trim_end_matches('/'))
    }

    async fn execute_request(
        &self,
        messages: &[LlmMessage],
        params: &GenerationParams,
    ) -> Result<String, LlmError> {
        let request = OllamaChatRequest {
            model: &self.config.model,
            messages: messages
                .iter()
                .map(|m| OllamaMessage {
                    role: role_str(m.role),
                    content: &m.content,
                })
                .collect(),
            stream: false,
            options: OllamaOptions {
                temperature: params.temperature,
                num_predict: params.max_tokens,
            },
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

        let parsed: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok(parsed.message.content)
    }
}

#[async_trait]
impl LLMProvider for OllamaBackend {
    async fn generate(
        &self,
        messages: &[LlmMessage],
        params: &GenerationParams,
    ) -> Result<String, CoreError> {
        let mut backoff = self.config.initial_backoff;
        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            match self.execute_request(messages, params).await {
                Ok(text) => return Ok(text),
                Err(LlmError::Api { status, message }) if status < 500 => {
                    return Err(LlmError::Api { status, message }.into());
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "generation attempt failed, retrying");
                    last_err = Some(err);
                    if attempt < self.config.max_retries {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| LlmError::Generation("exhausted retries".to_string())).into())
    }
}

/// OpenAI-compatible (and Azure OpenAI) `/chat/completions` backend.
pub struct OpenAIBackend {
    client: reqwest::Client,
    config: LlmConfig,
    azure_api_version: Option<String>,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Deserialize)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OllamaResponseMessage,
}

impl OpenAIBackend {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(e.to_string()))?;
        Ok(Self {
            client,
            config,
            azure_api_version: None,
        })
    }

    pub fn azure(mut self, api_version: impl Into<String>) -> Self {
        self.azure_api_version = Some(api_version.into());
        self
    }

    fn chat_url(&self) -> String {
        match &self.azure_api_version {
            Some(version) => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={version}",
                self.config.endpoint.trim_end_matches('/'),
                self.config.model,
            ),
            None => format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/')),
        }
    }

    fn build_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.azure_api_version, &self.config.api_key) {
            (Some(_), Some(key)) => request.header("api-key", key),
            (None, Some(key)) => request.bearer_auth(key),
            _ => request,
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAIBackend {
    async fn generate(
        &self,
        messages: &[LlmMessage],
        params: &GenerationParams,
    ) -> Result<String, CoreError> {
        let request_body = OpenAIChatRequest {
            model: &self.config.model,
            messages: messages
                .iter()
                .map(|m| OllamaMessage {
                    role: role_str(m.role),
                    content: &m.content,
                })
                .collect(),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        let request = self.build_request(self.client.post(self.chat_url()).json(&request_body));
        let response = request.send().await.map_err(LlmError::from)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: body,
            }
            .into());
        }

        let parsed: OpenAIChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("empty choices array".to_string()).into())
    }
}
