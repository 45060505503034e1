//! Successful provider payloads.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::operation::AspectRatio;

/// Result of a prompt expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct TextExpansion {
    pub text: String,
    pub model: String,
    /// The provider stopped at the output-token limit; `text` is partial.
    pub truncated: bool,
}

/// An image returned by the provider, or a placeholder standing in for one.
#[derive(Clone, PartialEq)]
pub struct GeneratedImage {
    /// Raw image bytes (never base64).
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub seed: u64,
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: AspectRatio,
    pub prompt: String,
    pub model: String,
    pub generated_at: DateTime<Utc>,
    /// Wall time of the provider attempt that produced this image.
    pub elapsed: Duration,
    /// `true` when this is a synthesized placeholder, not provider output.
    pub degraded: bool,
}

impl GeneratedImage {
    /// Display seed derived from the prompt and generation time, in `0..1_000_000`.
    pub fn seed_for(prompt: &str, at: DateTime<Utc>) -> u64 {
        let mut hasher = DefaultHasher::new();
        prompt.hash(&mut hasher);
        at.timestamp_nanos_opt()
            .unwrap_or_else(|| at.timestamp())
            .hash(&mut hasher);
        hasher.finish() % 1_000_000
    }
}

impl std::fmt::Debug for GeneratedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedImage")
            .field("len", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .field("seed", &self.seed)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("aspect_ratio", &self.aspect_ratio)
            .field("model", &self.model)
            .field("generated_at", &self.generated_at)
            .field("elapsed", &self.elapsed)
            .field("degraded", &self.degraded)
            .finish()
    }
}
