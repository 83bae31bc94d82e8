//! Layered configuration for the retrieval-and-composition core (§4.11).

pub mod constants;
pub mod settings;

use thiserror::Error;

pub use settings::{load_settings, LlmSettings, RagSettings, RuntimeEnvironment, Settings, SurfaceSettings};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<ConfigError> for horei_core::Error {
    fn from(err: ConfigError) -> Self {
        horei_core::Error::fatal(err.to_string())
    }
}
