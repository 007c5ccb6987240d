//! In-memory TTL cache keyed by [`QuerySignature`].
//!
//! Expiry is lazy: an entry past its TTL is treated as absent and removed
//! the next time its signature is read. There is no background sweep, so
//! entries for signatures that are never read again stay resident until the
//! next invalidation.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use super::signature::QuerySignature;
use super::stats::CacheStats;

/// A cached value with its write time and lifetime.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub written_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Valid iff `now - written_at <= ttl`.
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.written_at) <= self.ttl
    }
}

/// Signature-keyed cache with per-entry TTL.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: HashMap<QuerySignature, CacheEntry<V>>,
    stats: CacheStats,
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `key` as of now.
    pub fn get(&mut self, key: &QuerySignature) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Look up `key` as of `now`, dropping the entry if it has expired.
    pub fn get_at(&mut self, key: &QuerySignature, now: Instant) -> Option<V> {
        let valid = match self.entries.get(key) {
            Some(entry) => entry.is_valid_at(now),
            None => {
                self.stats.misses += 1;
                return None;
            }
        };

        if valid {
            self.stats.hits += 1;
            self.entries.get(key).map(|entry| entry.value.clone())
        } else {
            self.entries.remove(key);
            self.stats.expired += 1;
            self.stats.misses += 1;
            None
        }
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn insert(&mut self, key: QuerySignature, value: V, ttl: Duration) {
        self.insert_at(key, value, ttl, Instant::now());
    }

    pub fn insert_at(&mut self, key: QuerySignature, value: V, ttl: Duration, now: Instant) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                written_at: now,
                ttl,
            },
        );
    }
}

impl<V> TtlCache<V> {
    /// Drop every entry. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        self.stats.invalidations += removed as u64;
        removed
    }

    /// Drop entries whose rendered signature contains `pattern`.
    pub fn invalidate_matching(&mut self, pattern: &str) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|key, _| !key.to_string().contains(pattern));
        let removed = before - self.entries.len();
        self.stats.invalidations += removed as u64;
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rendered signatures of every resident entry, expired or not, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().map(ToString::to_string).collect();
        keys.sort();
        keys
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.entries.len() as u64,
            ..self.stats
        }
    }
}
