//! Generative model, embedding, and translator adapters (§4.1, §4.8, §6).

pub mod backend;
pub mod embeddings;
pub mod translator;

pub use backend::{LlmConfig, OllamaBackend, OpenAIBackend};
pub use embeddings::OllamaEmbeddingProvider;
pub use translator::LlmTranslator;

use thiserror::Error;

use horei_core::Error as CoreError;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("generation failed: {0}")]
    Generation(String),

    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(std::time::Duration::from_secs(0))
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for CoreError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Generation(msg) => CoreError::transient(msg),
            LlmError::Api { status, message } if status >= 500 => {
                CoreError::transient(format!("{status}: {message}"))
            }
            LlmError::Api { status, message } => CoreError::fatal(format!("{status}: {message}")),
            LlmError::Network(msg) => CoreError::transient(msg),
            LlmError::InvalidResponse(msg) => CoreError::transient(msg),
            LlmError::Timeout(d) => CoreError::Timeout(format!("{d:?}")),
            LlmError::ModelNotFound(msg) => CoreError::fatal(msg),
            LlmError::Configuration(msg) => CoreError::fatal(msg),
        }
    }
}
