//! Telemetry metric name constants.
//!
//! Consumers install their own `metrics` recorder (e.g. prometheus, statsd);
//! without a recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `bananaai_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `operation` — operation class (e.g. "assist", "generate", "upload")
//! - `status` — outcome: "ok" or "error"
//! - `outcome` — provider classification ("success", "safety_blocked", ...)

/// Total gateway requests that passed admission.
///
/// Labels: `operation`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "bananaai_requests_total";

/// Total requests denied by the sliding-window limiter.
///
/// Labels: `operation`.
pub const RATE_LIMITED_TOTAL: &str = "bananaai_rate_limited_total";

/// Total response cache hits.
///
/// Labels: `operation`.
pub const CACHE_HITS_TOTAL: &str = "bananaai_cache_hits_total";

/// Total response cache misses (including lazily expired entries).
///
/// Labels: `operation`.
pub const CACHE_MISSES_TOTAL: &str = "bananaai_cache_misses_total";

/// Total entries evicted to keep the cache within its capacity.
pub const CACHE_EVICTIONS_TOTAL: &str = "bananaai_cache_evictions_total";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `operation`.
pub const RETRIES_TOTAL: &str = "bananaai_retries_total";

/// Provider call outcomes after classification.
///
/// Labels: `operation`, `outcome`.
pub const PROVIDER_OUTCOMES_TOTAL: &str = "bananaai_provider_outcomes_total";

/// Total placeholder results substituted for empty provider responses.
///
/// Labels: `operation`.
pub const DEGRADED_TOTAL: &str = "bananaai_degraded_total";

/// Duration of a single provider attempt in seconds.
///
/// Labels: `operation`.
pub const PROVIDER_DURATION_SECONDS: &str = "bananaai_provider_duration_seconds";
