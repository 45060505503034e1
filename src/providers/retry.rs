//! Retry configuration, backoff calculation and the retry orchestrator.
//!
//! [`RetryOrchestrator`] is the only component that retries. It drives a
//! provider call up to `max_attempts` times, consulting the classified
//! [`Outcome`] after each attempt:
//!
//! | Outcome         | Action                                        |
//! |-----------------|-----------------------------------------------|
//! | `Success`       | return immediately                            |
//! | `SafetyBlocked` | `ContentPolicyViolation`, no further attempts |
//! | `Fatal`         | `ServiceUnavailable`, no further attempts     |
//! | `Empty`         | back off, retry                               |
//! | `Transient`     | back off, retry                               |
//!
//! Backoff suspends only the calling task (`tokio::time::sleep`) and no
//! lock is held across it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use super::placeholder::placeholder_image;
use super::traits::{ImageProvider, TextProvider};
use crate::telemetry;
use crate::types::{ExpandOptions, GeneratedImage, ImageOptions, Outcome, TextExpansion};
use crate::{BananaError, Result};

/// Configuration for retry behaviour on retryable outcomes.
///
/// ```rust
/// # use bananaai::providers::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .base_delay(Duration::from_millis(200))
///     .placeholder_fallback(false);
/// assert_eq!(config.delay_for_attempt(2), Duration::from_millis(800));
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry; 0 is treated as 1. Default: 3.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles per attempt. Default: 1s.
    pub base_delay: Duration,
    /// Upper bound for a single backoff sleep. Default: 60s.
    pub max_delay: Duration,
    /// Substitute a flagged placeholder when image generation ends empty.
    /// Default: true.
    pub placeholder_fallback: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            placeholder_fallback: true,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn placeholder_fallback(mut self, enabled: bool) -> Self {
        self.placeholder_fallback = enabled;
        self
    }

    /// Backoff after attempt `attempt` (0-indexed): `base_delay * 2^attempt`,
    /// capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// Backoff honouring a provider `Retry-After` hint when it asks for
    /// longer than the computed delay. Still capped at `max_delay`.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = self.delay_for_attempt(attempt);
        retry_after
            .map_or(backoff, |hint| hint.max(backoff))
            .min(self.max_delay)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// How an orchestrated call resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    Success(T),
    ContentPolicyViolation {
        reason: String,
    },
    ServiceUnavailable {
        message: String,
        /// The final attempt classified as `Empty`.
        last_empty: bool,
    },
}

impl<T> Resolution<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Success(value) => Ok(value),
            Self::ContentPolicyViolation { reason } => Err(BananaError::ContentPolicy { reason }),
            Self::ServiceUnavailable { message, .. } => Err(BananaError::ServiceUnavailable(message)),
        }
    }
}

/// Drives provider calls with bounded exponential backoff.
pub struct RetryOrchestrator {
    text: Arc<dyn TextProvider>,
    image: Arc<dyn ImageProvider>,
    config: RetryConfig,
}

impl RetryOrchestrator {
    pub fn new(
        text: Arc<dyn TextProvider>,
        image: Arc<dyn ImageProvider>,
        config: RetryConfig,
    ) -> Self {
        Self {
            text,
            image,
            config,
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Expand a prompt with retries.
    pub async fn expand(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &ExpandOptions,
    ) -> Resolution<TextExpansion> {
        invoke(&self.config, "assist", || {
            self.text.expand(system_prompt, user_prompt, options)
        })
        .await
    }

    /// Generate an image with retries.
    ///
    /// When the final attempt is `Empty` and placeholder fallback is on,
    /// resolves to a degraded placeholder instead of `ServiceUnavailable`.
    pub async fn generate_image(
        &self,
        prompt: &str,
        options: &ImageOptions,
    ) -> Resolution<GeneratedImage> {
        let started = Instant::now();
        let resolution = invoke(&self.config, "generate", || {
            self.image.generate_image(prompt, options)
        })
        .await;

        match resolution {
            Resolution::ServiceUnavailable {
                last_empty: true,
                message,
            } if self.config.placeholder_fallback => {
                warn!(
                    provider = self.image.name(),
                    model = self.image.model(),
                    error = %message,
                    "substituting placeholder image"
                );
                match placeholder_image(prompt, options, self.image.model(), started.elapsed()) {
                    Ok(image) => {
                        metrics::counter!(telemetry::DEGRADED_TOTAL, "operation" => "generate")
                            .increment(1);
                        Resolution::Success(image)
                    }
                    Err(err) => {
                        warn!(error = %err, "placeholder unavailable");
                        Resolution::ServiceUnavailable {
                            last_empty: true,
                            message,
                        }
                    }
                }
            }
            other => other,
        }
    }
}

/// Run `call` until it succeeds, fails fast, or attempts run out.
///
/// At least one attempt is always made. No sleep follows the final attempt.
pub async fn invoke<T, F, Fut>(
    config: &RetryConfig,
    operation: &'static str,
    mut call: F,
) -> Resolution<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Outcome<T>>,
{
    let attempts = config.attempts();
    let mut last_error = String::new();
    let mut last_empty = false;

    for attempt in 0..attempts {
        let started = Instant::now();
        let outcome = call().await;
        metrics::histogram!(telemetry::PROVIDER_DURATION_SECONDS, "operation" => operation)
            .record(started.elapsed().as_secs_f64());
        metrics::counter!(telemetry::PROVIDER_OUTCOMES_TOTAL,
            "operation" => operation,
            "outcome" => outcome.kind(),
        )
        .increment(1);

        let retry_after = match outcome {
            Outcome::Success(value) => return Resolution::Success(value),
            Outcome::SafetyBlocked { reason } => {
                debug!(operation, attempt = attempt + 1, reason = %reason, "blocked by content policy");
                return Resolution::ContentPolicyViolation { reason };
            }
            Outcome::Fatal { message } => {
                warn!(operation, attempt = attempt + 1, error = %message, "fatal provider error");
                return Resolution::ServiceUnavailable {
                    message,
                    last_empty: false,
                };
            }
            Outcome::Empty => {
                last_error = "provider returned no usable payload".to_string();
                last_empty = true;
                None
            }
            Outcome::Transient {
                message,
                retry_after,
            } => {
                last_error = message;
                last_empty = false;
                retry_after
            }
        };

        if attempt + 1 < attempts {
            let delay = config.effective_delay(attempt, retry_after);
            metrics::counter!(telemetry::RETRIES_TOTAL, "operation" => operation).increment(1);
            warn!(
                operation,
                attempt = attempt + 1,
                max_attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %last_error,
                "retrying after retryable outcome"
            );
            tokio::time::sleep(delay).await;
        }
    }

    warn!(operation, attempts, error = %last_error, "retries exhausted");
    Resolution::ServiceUnavailable {
        message: format!("retries exhausted after {attempts} attempts: {last_error}"),
        last_empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let config = RetryConfig::new().max_delay(Duration::from_secs(3));
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(3));
        assert_eq!(config.delay_for_attempt(40), Duration::from_secs(3));
    }

    #[test]
    fn retry_after_hint_only_lengthens() {
        let config = RetryConfig::new();
        assert_eq!(
            config.effective_delay(0, Some(Duration::from_millis(10))),
            Duration::from_secs(1)
        );
        assert_eq!(
            config.effective_delay(0, Some(Duration::from_secs(5))),
            Duration::from_secs(5)
        );
        assert_eq!(
            config.effective_delay(0, Some(Duration::from_secs(600))),
            Duration::from_secs(60)
        );
    }

    #[tokio::test]
    async fn zero_attempts_still_calls_once() {
        let config = RetryConfig::new().max_attempts(0);
        let mut calls = 0;
        let resolution = invoke(&config, "assist", || {
            calls += 1;
            async { Outcome::Success(7) }
        })
        .await;
        assert_eq!(resolution, Resolution::Success(7));
        assert_eq!(calls, 1);
    }

    #[test]
    fn resolution_maps_to_errors() {
        let err = Resolution::<()>::ContentPolicyViolation {
            reason: "SAFETY".into(),
        }
        .into_result()
        .unwrap_err();
        assert_eq!(err.status_code(), 422);
        let err = Resolution::<()>::ServiceUnavailable {
            message: "x".into(),
            last_empty: true,
        }
        .into_result()
        .unwrap_err();
        assert_eq!(err.status_code(), 503);
    }
}
