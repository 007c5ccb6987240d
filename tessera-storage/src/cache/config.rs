//! Cache lifetimes.

use std::time::Duration;

/// TTL applied to list and single-record reads.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// TTL applied to counts, which go stale faster than content.
pub const DEFAULT_COUNT_TTL: Duration = Duration::from_secs(60);

/// Configuration for collection caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL for `list`, `get_one` and everything built on them.
    pub default_ttl: Duration,
    /// TTL for `count`.
    pub count_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            count_ttl: DEFAULT_COUNT_TTL,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the read TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the count TTL.
    pub fn with_count_ttl(mut self, ttl: Duration) -> Self {
        self.count_ttl = ttl;
        self
    }
}
