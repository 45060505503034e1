use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Deterministic fingerprint of a cacheable request.
///
/// Built from the operation name and every parameter that influences the
/// provider's answer. Uses `DefaultHasher` (SipHash with fixed keys), which
/// is stable within a process lifetime; that is all an in-memory cache needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(u64);

impl CacheKey {
    /// Start a fingerprint for `operation`.
    pub fn builder(operation: &str) -> CacheKeyBuilder {
        let mut hasher = DefaultHasher::new();
        operation.hash(&mut hasher);
        CacheKeyBuilder { hasher }
    }

    /// Wrap a precomputed fingerprint.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Incremental [`CacheKey`] construction. Field order matters.
pub struct CacheKeyBuilder {
    hasher: DefaultHasher,
}

impl CacheKeyBuilder {
    pub fn text(mut self, value: &str) -> Self {
        value.hash(&mut self.hasher);
        self
    }

    pub fn optional_text(mut self, value: Option<&str>) -> Self {
        value.hash(&mut self.hasher);
        self
    }

    pub fn bytes(mut self, value: &[u8]) -> Self {
        value.hash(&mut self.hasher);
        self
    }

    /// Floats are hashed by bit pattern, so `0.1 + 0.2` and `0.3` differ.
    pub fn float(mut self, value: f32) -> Self {
        value.to_bits().hash(&mut self.hasher);
        self
    }

    pub fn number(mut self, value: u64) -> Self {
        value.hash(&mut self.hasher);
        self
    }

    pub fn finish(self) -> CacheKey {
        CacheKey(self.hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_deterministic() {
        let k1 = CacheKey::builder("assist").text("cat").text("9:16").finish();
        let k2 = CacheKey::builder("assist").text("cat").text("9:16").finish();
        assert_eq!(k1, k2);
    }

    #[test]
    fn key_differs_on_operation() {
        let k1 = CacheKey::builder("assist").text("cat").finish();
        let k2 = CacheKey::builder("generate").text("cat").finish();
        assert_ne!(k1, k2);
    }

    #[test]
    fn key_field_boundaries_matter() {
        let k1 = CacheKey::builder("assist").text("ab").text("c").finish();
        let k2 = CacheKey::builder("assist").text("a").text("bc").finish();
        assert_ne!(k1, k2);
    }

    #[test]
    fn absent_and_empty_optional_differ() {
        let k1 = CacheKey::builder("g").optional_text(None).finish();
        let k2 = CacheKey::builder("g").optional_text(Some("")).finish();
        assert_ne!(k1, k2);
    }
}
