//! BananaAI error types

use std::time::Duration;

/// Errors surfaced by the gateway and its collaborators.
///
/// The first five variants are the caller-facing taxonomy; the rest are
/// plumbing failures that the outer boundary renders as internal errors.
#[derive(Debug, thiserror::Error)]
pub enum BananaError {
    /// Malformed caller input. Never retried.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// The provider refused the prompt or its output on policy grounds.
    #[error("content policy violation: {reason}")]
    ContentPolicy { reason: String },

    /// Retries exhausted, or the provider failed in a way retrying cannot fix.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BananaError {
    /// HTTP status the outer boundary should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::RateLimited { .. } => 429,
            Self::ContentPolicy { .. } => 422,
            Self::ServiceUnavailable(_) => 503,
            Self::Internal(_) | Self::Configuration(_) | Self::Io(_) | Self::Json(_) => 500,
        }
    }

    /// Message safe to show to a remote caller.
    ///
    /// Internal failures collapse to a fixed string so paths, provider
    /// payloads and configuration details never leave the process.
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::RateLimited { .. } => "Rate limit exceeded".to_string(),
            Self::ContentPolicy { .. } => "Prompt contains inappropriate content".to_string(),
            Self::ServiceUnavailable(_) => "Service temporarily unavailable".to_string(),
            Self::Internal(_) | Self::Configuration(_) | Self::Io(_) | Self::Json(_) => {
                "Internal server error".to_string()
            }
        }
    }

    /// Wait hint for rate-limited callers.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Result type alias for BananaAI operations
pub type Result<T> = std::result::Result<T, BananaError>;
