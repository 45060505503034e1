//! Bounded TTL + LRU response cache.
//!
//! [`ResponseCache`] stores provider results keyed by a [`CacheKey`]
//! fingerprint of the request. Two rules govern every entry:
//!
//! - **Absolute expiry.** An entry is served until `inserted_at + ttl` and
//!   never after. Expiry is lazy: an expired entry is removed by the first
//!   read that finds it.
//! - **Recency eviction.** When a new key arrives at capacity, the entry
//!   with the oldest access time is evicted. Ties go to the entry that was
//!   touched first, so with no intervening reads the first-inserted key is
//!   the one evicted.
//!
//! # Concurrency
//!
//! Entries live in a sharded [`DashMap`]; reads and writes of one key lock
//! only that key's shard. The capacity bound is enforced with an atomic
//! slot counter: an inserter either claims a free slot or evicts a victim
//! and takes over its slot, so concurrent inserts can never push the store
//! past `max_entries`. Victim selection is a linear scan, which stays cheap
//! at the small capacities this cache is meant for.
//!
//! # Failure behaviour
//!
//! The cache has no error paths visible to callers. Anything that prevents
//! a lookup from producing a fresh value is reported as a miss.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use tokio::time::Instant;

use super::key::CacheKey;
use crate::telemetry;

/// Expiry used when `now + ttl` overflows the clock.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// Configuration for the response cache.
///
/// ```rust
/// # use bananaai::cache::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(500)
///     .ttl(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries. `0` disables caching. Default: 100.
    pub max_entries: usize,
    /// Time-to-live applied by [`ResponseCache::insert`]. Default: 1 hour.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            ttl: Duration::from_secs(3600),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

#[derive(Debug, Clone)]
struct Slot<V> {
    value: V,
    expires_at: Instant,
    last_access: Instant,
    /// Monotonic touch counter; breaks `last_access` ties.
    touched: u64,
}

impl<V> Slot<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }

    fn recency(&self) -> (Instant, u64) {
        (self.last_access, self.touched)
    }
}

/// In-memory TTL + LRU cache. See module docs.
pub struct ResponseCache<V> {
    entries: DashMap<CacheKey, Slot<V>>,
    /// Slots claimed by present or in-flight entries; never exceeds `max_entries`.
    claimed: AtomicUsize,
    touches: AtomicU64,
    max_entries: usize,
    default_ttl: Duration,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            claimed: AtomicUsize::new(0),
            touches: AtomicU64::new(0),
            max_entries: config.max_entries,
            default_ttl: config.ttl,
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up a value.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Look up a value as of `now`, refreshing its access time on a hit.
    pub fn get_at(&self, key: &CacheKey, now: Instant) -> Option<V> {
        {
            let mut slot = self.entries.get_mut(key)?;
            if !slot.is_expired(now) {
                slot.last_access = now;
                slot.touched = self.next_touch();
                return Some(slot.value.clone());
            }
        }
        // Re-check under the removal lock: a writer may have refreshed it.
        if self
            .entries
            .remove_if(key, |_, slot| slot.is_expired(now))
            .is_some()
        {
            self.claimed.fetch_sub(1, Ordering::AcqRel);
        }
        None
    }

    /// Insert with the configured default TTL.
    pub fn insert(&self, key: CacheKey, value: V) {
        self.insert_at(key, value, self.default_ttl, Instant::now());
    }

    /// Insert with an explicit TTL.
    pub fn insert_with_ttl(&self, key: CacheKey, value: V, ttl: Duration) {
        self.insert_at(key, value, ttl, Instant::now());
    }

    /// Insert or overwrite `key` as of `now`, evicting the least recently
    /// used entry first if the cache is full and `key` is new.
    pub fn insert_at(&self, key: CacheKey, value: V, ttl: Duration, now: Instant) {
        if self.max_entries == 0 {
            return;
        }
        let slot = Slot {
            value,
            expires_at: now
                .checked_add(ttl)
                .or_else(|| now.checked_add(FAR_FUTURE))
                .unwrap_or(now),
            last_access: now,
            touched: self.next_touch(),
        };

        if let Some(mut existing) = self.entries.get_mut(&key) {
            *existing = slot;
            return;
        }

        self.claim_slot();
        match self.entries.entry(key) {
            MapEntry::Occupied(mut occupied) => {
                // Another writer inserted the key meanwhile; hand our slot back.
                occupied.insert(slot);
                self.claimed.fetch_sub(1, Ordering::AcqRel);
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(slot);
            }
        }
    }

    /// Remove a key, returning its value if it was present and fresh.
    pub fn remove(&self, key: &CacheKey) -> Option<V> {
        let (_, slot) = self.entries.remove(key)?;
        self.claimed.fetch_sub(1, Ordering::AcqRel);
        (!slot.is_expired(Instant::now())).then_some(slot.value)
    }

    /// Number of stored entries, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evict everything.
    pub fn clear(&self) {
        let keys: Vec<CacheKey> = self.entries.iter().map(|e| *e.key()).collect();
        for key in keys {
            if self.entries.remove(&key).is_some() {
                self.claimed.fetch_sub(1, Ordering::AcqRel);
            }
        }
    }

    fn next_touch(&self) -> u64 {
        self.touches.fetch_add(1, Ordering::Relaxed)
    }

    /// Reserve capacity for one new entry, evicting if necessary.
    fn claim_slot(&self) {
        loop {
            let claimed = self.claimed.load(Ordering::Acquire);
            if claimed < self.max_entries {
                if self
                    .claimed
                    .compare_exchange(claimed, claimed + 1, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    return;
                }
                continue;
            }
            if self.evict_lru() {
                return;
            }
            // Every claimed slot is still in flight or the victim vanished
            // under us; let the other writers finish.
            std::thread::yield_now();
        }
    }

    /// Remove the least recently used entry, taking over its slot.
    fn evict_lru(&self) -> bool {
        let victim = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().recency())
            .map(|entry| (*entry.key(), entry.value().touched));

        let Some((key, touched)) = victim else {
            return false;
        };
        // Skip if the victim was read or rewritten since the scan.
        let evicted = self
            .entries
            .remove_if(&key, |_, slot| slot.touched == touched)
            .is_some();
        if evicted {
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL).increment(1);
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u64) -> CacheKey {
        CacheKey::from_raw(n)
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let cache = ResponseCache::new(&CacheConfig::new().max_entries(0));
        cache.insert(key(1), "v");
        assert!(cache.is_empty());
        assert_eq!(cache.get(&key(1)), None);
    }

    #[test]
    fn overwrite_does_not_evict() {
        let cache = ResponseCache::new(&CacheConfig::new().max_entries(2));
        let now = Instant::now();
        cache.insert_at(key(1), "a", Duration::from_secs(60), now);
        cache.insert_at(key(2), "b", Duration::from_secs(60), now);
        cache.insert_at(key(1), "a2", Duration::from_secs(60), now);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get_at(&key(1), now), Some("a2"));
        assert_eq!(cache.get_at(&key(2), now), Some("b"));
    }

    #[test]
    fn expired_entry_frees_its_slot() {
        let cache = ResponseCache::new(&CacheConfig::new().max_entries(1));
        let now = Instant::now();
        cache.insert_at(key(1), 1, Duration::from_secs(1), now);
        assert_eq!(cache.get_at(&key(1), now + Duration::from_secs(2)), None);
        assert!(cache.is_empty());
        assert_eq!(cache.claimed.load(Ordering::Acquire), 0);
    }

    #[test]
    fn clear_releases_all_slots() {
        let cache = ResponseCache::new(&CacheConfig::new().max_entries(3));
        for n in 0..3 {
            cache.insert(key(n), n);
        }
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.claimed.load(Ordering::Acquire), 0);
    }
}
