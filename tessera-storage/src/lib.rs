//! TESSERA Storage - Cached Collection Accessors
//!
//! Generic data-access layer over a remote collection-oriented backend.
//! A [`Session`] carries the backend, the error classifier and the cache
//! configuration; each [`Collection`] wraps one named collection with a
//! TTL read cache, coarse invalidation on mutation and a realtime bridge
//! that clears the cache on every change event.
//!
//! The concrete transport lives behind [`CollectionBackend`]. [`MockBackend`]
//! is an in-memory implementation for tests.

pub mod backend;
pub mod cache;
pub mod collection;
pub mod mock;
pub mod realtime;
pub mod schema;
pub mod session;

pub use backend::{Attachment, BackendResult, ChangeFeed, CollectionBackend, Payload};
pub use cache::{CacheConfig, CacheStats, QuerySignature, TtlCache};
pub use collection::{BatchDeleteReport, CachedValue, Collection, WILDCARD_TOPIC};
pub use mock::{MockBackend, MockOperation};
pub use realtime::Subscription;
pub use schema::{CollectionSchema, DefaultSchema, DEFAULT_SEARCHABLE_FIELDS};
pub use session::Session;
