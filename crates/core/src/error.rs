//! Error taxonomy for the retrieval-and-composition core.
//!
//! This is the error type the orchestrator actually returns to callers. Each
//! crate keeps its own `thiserror` enum scoped to its own concerns (`RagError`,
//! `LlmError`, `ConfigError`) and converts into one of the variants here at
//! the orchestrator boundary, classifying the underlying cause.

use thiserror::Error;

/// Top-level result alias used across the orchestrator.
pub type Result<T> = std::result::Result<T, Error>;

/// The four error classes described by the error handling design: input
/// validation, transient (retryable) I/O, fatal (unretryable) failures, plus
/// the two special terminal cases (timeout exhaustion and cancellation).
///
/// Degradation is deliberately not a variant here: a degraded subsystem is
/// recovered from inline (logged, feature toggle flips off) and never
/// surfaces as an `Error` to the caller.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    Input(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("fatal failure: {0}")]
    Fatal(String),

    #[error("deadline exceeded: {0}")]
    Timeout(String),

    #[error("request cancelled")]
    Cancelled,
}

impl Error {
    pub fn input(msg: impl Into<String>) -> Self {
        Error::Input(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Error::Fatal(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Error::Transient(msg.into())
    }

    /// Whether a caller may retry the request as-is (true for Transient and
    /// Timeout while retry budget remains; the orchestrator itself already
    /// exhausts the retry budget for I/O before returning, so by the time an
    /// error crosses this boundary it is informational, not actionable).
    pub fn is_retryable_class(&self) -> bool {
        matches!(self, Error::Transient(_) | Error::Timeout(_))
    }
}
