//! Response caching.
//!
//! - [`ResponseCache`] — bounded TTL + LRU store for provider results,
//!   owned by the [`Gateway`](crate::Gateway) and consulted after admission
//!   and before the retry orchestrator. See [`response`] for the eviction
//!   and expiry rules.
//! - [`CacheKey`] — request fingerprint built with [`CacheKey::builder`].
//!
//! State is process-local and lost on restart.

mod key;
pub mod response;

pub use key::{CacheKey, CacheKeyBuilder};
pub use response::{CacheConfig, ResponseCache};
