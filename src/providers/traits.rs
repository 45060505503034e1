//! Provider traits for capability-specific implementations.
//!
//! Providers implement one trait per capability rather than a single
//! "god trait", so a deployment can route text and images to different
//! backends and tests can mock each independently.
//!
//! # Classification contract
//!
//! Providers never return `Err`. Every call resolves to an [`Outcome`]:
//! transport failures, HTTP status codes and provider-specific response
//! shapes are all mapped onto the five outcome kinds here, at the edge,
//! so the [`RetryOrchestrator`](super::RetryOrchestrator) can decide
//! retry vs. fail-fast without knowing anything about the wire format.
//!
//! A response with no usable payload and no explicit block or error
//! signal must classify as [`Outcome::Empty`], not [`Outcome::Fatal`].

use async_trait::async_trait;

use crate::types::{ExpandOptions, GeneratedImage, ImageOptions, Outcome, TextExpansion};

/// Provider for prompt expansion.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    /// Expand `user_prompt` under `system_prompt`.
    async fn expand(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &ExpandOptions,
    ) -> Outcome<TextExpansion>;
}

/// Provider for image synthesis.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    /// Model name reported on results (including degraded ones).
    fn model(&self) -> &str;

    /// Generate one image. Returned bytes must already be raw image data.
    async fn generate_image(&self, prompt: &str, options: &ImageOptions)
    -> Outcome<GeneratedImage>;
}
