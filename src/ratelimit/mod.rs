//! Per-client sliding-window admission control.
//!
//! Every `(client, operation class)` pair owns a queue of admission
//! timestamps covering the trailing window. A request is admitted when,
//! after dropping timestamps that have aged out, fewer than `limit` remain.
//! A rolling window (rather than fixed per-minute buckets) never admits two
//! full quotas back to back across a bucket boundary.
//!
//! # Concurrency
//!
//! Windows live in a bounded [`moka`] cache, which shards its storage, and
//! each window sits behind its own mutex. Two requests only contend when
//! they share both client and operation class. The mutex is never held
//! across an `.await`.
//!
//! # Reclaiming idle clients
//!
//! Entries expire after being idle for one full window. An idle window holds
//! only timestamps that would be purged on the next check, so reclaiming it
//! is invisible to callers. The capacity cap (`max_tracked_clients`) bounds
//! memory when many distinct clients are active at once.
//!
//! At capacity the limiter fails open in two ways. moka may evict a live
//! window, so that client starts over with an empty quota. moka's admission
//! policy may also refuse to store a new client's window at all; that client
//! then receives a fresh, unstored window on every call and is never limited
//! until capacity frees up. Size `max_tracked_clients` above the expected
//! number of concurrently active clients.

mod config;

pub use config::RateLimitConfig;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::telemetry;
use crate::types::{ClientKey, OperationClass};

/// Admission decision for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Denied { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Wait hint for denied requests.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Allowed => None,
            Self::Denied { retry_after } => Some(*retry_after),
        }
    }

    /// Wait hint in fractional seconds, as returned to HTTP callers.
    pub fn retry_after_secs(&self) -> Option<f64> {
        self.retry_after().map(|d| d.as_secs_f64())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WindowKey {
    client: ClientKey,
    class: OperationClass,
}

type Window = Arc<Mutex<VecDeque<Instant>>>;

/// Sliding-window rate limiter keyed by client and operation class.
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: moka::sync::Cache<WindowKey, Window>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let windows = moka::sync::Cache::builder()
            .max_capacity(config.max_tracked_clients)
            .time_to_idle(config.window.max(Duration::from_millis(1)))
            .build();
        Self { config, windows }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check admission for a request arriving now, recording it if allowed.
    pub fn check_and_record(&self, client: &ClientKey, class: OperationClass) -> Admission {
        self.check_and_record_at(client, class, Instant::now())
    }

    /// Check admission for a request arriving at `now`, recording it if allowed.
    ///
    /// A timestamp ages out once it is a full window old, so a client that
    /// waits `window` after its oldest counted request is admitted again.
    pub fn check_and_record_at(
        &self,
        client: &ClientKey,
        class: OperationClass,
        now: Instant,
    ) -> Admission {
        let limit = self.config.limit_for(class) as usize;
        let window_len = self.config.window;

        let admission = if limit == 0 {
            Admission::Denied {
                retry_after: window_len,
            }
        } else {
            let key = WindowKey {
                client: client.clone(),
                class,
            };
            let window = self
                .windows
                .get_with(key, || Arc::new(Mutex::new(VecDeque::new())));
            // A panic while holding the lock cannot leave the queue half-updated.
            let mut stamps = window.lock().unwrap_or_else(PoisonError::into_inner);

            while let Some(&oldest) = stamps.front() {
                if now.saturating_duration_since(oldest) >= window_len {
                    stamps.pop_front();
                } else {
                    break;
                }
            }

            if stamps.len() < limit {
                // Callers may race on `now`; keep the queue ordered.
                let stamp = stamps.back().map_or(now, |&last| last.max(now));
                stamps.push_back(stamp);
                Admission::Allowed
            } else {
                let oldest = stamps.front().copied().unwrap_or(now);
                Admission::Denied {
                    retry_after: window_len.saturating_sub(now.saturating_duration_since(oldest)),
                }
            }
        };

        if let Admission::Denied { retry_after } = admission {
            metrics::counter!(telemetry::RATE_LIMITED_TOTAL, "operation" => class.as_str())
                .increment(1);
            debug!(
                client = %client,
                operation = class.as_str(),
                limit,
                retry_after_ms = retry_after.as_millis() as u64,
                "request denied by rate limiter"
            );
        }
        admission
    }

    /// Number of live `(client, class)` windows. Approximate under concurrency.
    pub fn tracked_windows(&self) -> u64 {
        self.windows.run_pending_tasks();
        self.windows.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig::new().limit(OperationClass::Assist, limit))
    }

    #[test]
    fn tracked_windows_never_exceed_capacity() {
        let limiter = RateLimiter::new(RateLimitConfig::new().max_tracked_clients(4));
        let now = Instant::now();
        for i in 0..64 {
            let client = ClientKey::from(format!("client-{i}"));
            let admission = limiter.check_and_record_at(&client, OperationClass::Assist, now);
            assert!(admission.is_allowed());
        }
        assert!(limiter.tracked_windows() <= 4);
    }

    #[test]
    fn zero_limit_always_denies() {
        let limiter = limiter(0);
        let now = Instant::now();
        let admission = limiter.check_and_record_at(&"c".into(), OperationClass::Assist, now);
        assert_eq!(
            admission,
            Admission::Denied {
                retry_after: Duration::from_secs(60)
            }
        );
    }

    #[test]
    fn denied_requests_are_not_recorded() {
        let limiter = limiter(1);
        let client = ClientKey::from("c");
        let start = Instant::now();
        assert!(
            limiter
                .check_and_record_at(&client, OperationClass::Assist, start)
                .is_allowed()
        );
        for s in 1..30 {
            let at = start + Duration::from_secs(s);
            assert!(
                !limiter
                    .check_and_record_at(&client, OperationClass::Assist, at)
                    .is_allowed()
            );
        }
        // Only the first request counts, so the window reopens at +60s.
        let reopened = start + Duration::from_secs(60);
        assert!(
            limiter
                .check_and_record_at(&client, OperationClass::Assist, reopened)
                .is_allowed()
        );
    }

    #[test]
    fn out_of_order_now_keeps_queue_ordered() {
        let limiter = limiter(3);
        let client = ClientKey::from("c");
        let start = Instant::now() + Duration::from_secs(10);
        limiter.check_and_record_at(&client, OperationClass::Assist, start);
        limiter.check_and_record_at(&client, OperationClass::Assist, start - Duration::from_secs(5));
        limiter.check_and_record_at(&client, OperationClass::Assist, start + Duration::from_secs(1));
        let denied = limiter.check_and_record_at(
            &client,
            OperationClass::Assist,
            start + Duration::from_secs(2),
        );
        assert_eq!(denied.retry_after(), Some(Duration::from_secs(58)));
    }
}
