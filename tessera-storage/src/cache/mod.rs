//! Per-collection read cache.
//!
//! Every [`Collection`](crate::Collection) owns one [`TtlCache`]. Reads are
//! keyed by a [`QuerySignature`] built from the resolved query, so calls that
//! differ only in field order or in spelling out defaults share an entry.
//! Invalidation is coarse: any mutation or realtime event on the collection
//! clears the whole cache.

pub mod config;
pub mod signature;
pub mod stats;
pub mod ttl;

pub use config::{CacheConfig, DEFAULT_COUNT_TTL, DEFAULT_TTL};
pub use signature::{canonical_json, QuerySignature};
pub use stats::CacheStats;
pub use ttl::{CacheEntry, TtlCache};
