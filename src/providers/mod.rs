//! Provider client abstraction and the retry orchestrator built on it.
//!
//! - [`traits`] — capability traits every provider implements.
//! - [`classify`] — reduction of Gemini response shapes to [`Outcome`](crate::Outcome).
//! - [`payload`] — image sniffing and base64 / data-URL decoding.
//! - [`GeminiClient`] — the HTTP provider.
//! - [`RetryOrchestrator`] — bounded retries with exponential backoff.

pub mod classify;
pub mod gemini;
pub mod payload;
pub mod placeholder;
pub mod retry;
pub mod traits;

pub use gemini::GeminiClient;
pub use payload::{ImageFormat, decode_image};
pub use retry::{Resolution, RetryConfig, RetryOrchestrator};
pub use traits::{ImageProvider, TextProvider};
