//! BananaAI - request governance for generative text and image providers
//!
//! This crate fronts a Gemini-style provider with the three pieces every
//! inbound request passes through:
//!
//! - a per-client sliding-window [`RateLimiter`](ratelimit::RateLimiter),
//! - a bounded TTL/LRU [`ResponseCache`](cache::ResponseCache),
//! - a [`RetryOrchestrator`](providers::RetryOrchestrator) that classifies
//!   provider outcomes and retries with exponential backoff.
//!
//! [`Gateway`] composes them; the HTTP or CLI layer only parses requests
//! and renders [`BananaError`]s.
//!
//! # Example
//!
//! ```rust,no_run
//! use bananaai::{AssistRequest, ClientKey, Gateway, GeminiClient};
//!
//! #[tokio::main]
//! async fn main() -> bananaai::Result<()> {
//!     let gateway = Gateway::builder()
//!         .gemini(GeminiClient::new("your-gemini-key")?)
//!         .build()?;
//!
//!     let client = ClientKey::from("127.0.0.1");
//!     let response = gateway
//!         .assist(&client, AssistRequest::new("a cat on a tin roof").aspect_ratio("16:9"))
//!         .await?;
//!
//!     println!("{}", response.expanded);
//!     Ok(())
//! }
//! ```
//!
//! All state is memory-resident and lost on restart.

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod providers;
pub mod ratelimit;
pub mod storage;
pub mod telemetry;
pub mod types;
pub mod version;

// Re-export main types at crate root
pub use config::{Config, Secrets};
pub use error::{BananaError, Result};
pub use gateway::{
    AssistRequest, AssistResponse, Gateway, GatewayBuilder, GenerateRequest, GenerateResponse,
};
pub use providers::{GeminiClient, ImageProvider, Resolution, RetryConfig, TextProvider};
pub use version::{PKG_VERSION, version_string};

// Re-export all types
pub use types::{
    AspectRatio, ClientKey, ExpandOptions, GeneratedImage, HarmCategory, ImageOptions,
    OperationClass, Outcome, ReferenceMaterial, SafetySetting, SafetyThreshold, TextExpansion,
};
