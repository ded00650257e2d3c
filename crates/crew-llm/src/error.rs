//! Error types for LLM inference

use crew_core::StepError;
use thiserror::Error;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, InferenceError>;

/// Errors that can occur while talking to a model
#[derive(Error, Debug)]
pub enum InferenceError {
    /// API request failed
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Invalid API key or authentication failed
    #[error("Invalid API key or authentication failed")]
    AuthenticationFailed,

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// The request was rejected as malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The provider answered with something we cannot interpret
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// Missing credential or bad endpoint
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl InferenceError {
    /// Whether repeating the same request could succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RequestFailed(_)
                | Self::RateLimitExceeded(_)
                | Self::HttpError(_)
                | Self::UnexpectedResponse(_)
        )
    }
}

impl From<InferenceError> for StepError {
    fn from(err: InferenceError) -> Self {
        if err.is_transient() {
            StepError::Capability(err.to_string())
        } else {
            StepError::Fatal(err.to_string())
        }
    }
}
