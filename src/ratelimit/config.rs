use std::collections::HashMap;
use std::time::Duration;

use crate::types::OperationClass;

/// Configuration for the sliding-window rate limiter.
///
/// ```rust
/// # use bananaai::ratelimit::RateLimitConfig;
/// # use bananaai::OperationClass;
/// # use std::time::Duration;
/// let config = RateLimitConfig::new()
///     .window(Duration::from_secs(60))
///     .limit(OperationClass::Upload, 5);
/// assert_eq!(config.limit_for(OperationClass::Upload), 5);
/// ```
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Length of the trailing window. Default: 60s.
    pub window: Duration,
    /// Per-class request limits within one window.
    pub limits: HashMap<OperationClass, u32>,
    /// Limit for classes without an explicit entry. Default: 10.
    pub default_limit: u32,
    /// Upper bound on tracked `(client, class)` windows. Default: 100,000.
    pub max_tracked_clients: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            limits: HashMap::from([
                (OperationClass::Assist, 10),
                (OperationClass::Upload, 5),
                (OperationClass::Generate, 10),
            ]),
            default_limit: 10,
            max_tracked_clients: 100_000,
        }
    }
}

impl RateLimitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set the limit for one operation class.
    pub fn limit(mut self, class: OperationClass, limit: u32) -> Self {
        self.limits.insert(class, limit);
        self
    }

    /// Remove the explicit limit for a class so it falls back to the default.
    pub fn clear_limit(mut self, class: OperationClass) -> Self {
        self.limits.remove(&class);
        self
    }

    pub fn default_limit(mut self, limit: u32) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn max_tracked_clients(mut self, max: u64) -> Self {
        self.max_tracked_clients = max;
        self
    }

    /// Effective limit for a class.
    pub fn limit_for(&self, class: OperationClass) -> u32 {
        self.limits
            .get(&class)
            .copied()
            .unwrap_or(self.default_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_class_uses_default_limit() {
        let config = RateLimitConfig::new()
            .clear_limit(OperationClass::Generate)
            .default_limit(7);
        assert_eq!(config.limit_for(OperationClass::Generate), 7);
        assert_eq!(config.limit_for(OperationClass::Upload), 5);
    }
}
