//! Classified provider outcomes.

use std::time::Duration;

/// What a single provider call produced, reduced to the five cases the
/// retry policy distinguishes.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    /// Blocked by the provider's content policy. Not retryable.
    SafetyBlocked { reason: String },
    /// Misconfiguration, bad credentials, unknown model. Not retryable.
    Fatal { message: String },
    /// The provider answered but returned nothing usable.
    Empty,
    /// Network failure, throttling or a provider-side 5xx.
    Transient {
        message: String,
        retry_after: Option<Duration>,
    },
}

impl<T> Outcome<T> {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        Self::SafetyBlocked {
            reason: reason.into(),
        }
    }

    /// Whether the retry policy may try again after this outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Empty | Self::Transient { .. })
    }

    /// Metric label for this outcome.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::SafetyBlocked { .. } => "safety_blocked",
            Self::Fatal { .. } => "fatal",
            Self::Empty => "empty",
            Self::Transient { .. } => "transient",
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        self.and_then(|value| Outcome::Success(f(value)))
    }

    /// Chain a further classification step onto a successful outcome.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Outcome<U>) -> Outcome<U> {
        match self {
            Self::Success(value) => f(value),
            Self::SafetyBlocked { reason } => Outcome::SafetyBlocked { reason },
            Self::Fatal { message } => Outcome::Fatal { message },
            Self::Empty => Outcome::Empty,
            Self::Transient {
                message,
                retry_after,
            } => Outcome::Transient {
                message,
                retry_after,
            },
        }
    }
}
