//! Explicit session context.
//!
//! A [`Session`] bundles the backend connection, the error classifier and the
//! cache configuration. It is built once by the application and handed to each
//! [`Collection`]; separate sessions share nothing.

use std::fmt;
use std::sync::Arc;

use tessera_core::ErrorClassifier;

use crate::backend::CollectionBackend;
use crate::cache::CacheConfig;
use crate::collection::Collection;
use crate::schema::CollectionSchema;

#[derive(Clone)]
pub struct Session {
    backend: Arc<dyn CollectionBackend>,
    classifier: ErrorClassifier,
    cache: CacheConfig,
}

impl Session {
    pub fn new(backend: Arc<dyn CollectionBackend>, classifier: ErrorClassifier) -> Self {
        Self {
            backend,
            classifier,
            cache: CacheConfig::default(),
        }
    }

    /// Override the cache lifetimes for collections opened from this session.
    pub fn with_cache_config(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn backend(&self) -> &Arc<dyn CollectionBackend> {
        &self.backend
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    pub fn cache_config(&self) -> CacheConfig {
        self.cache
    }

    /// Open an accessor for `name` with its own empty cache.
    pub fn collection<S: CollectionSchema>(&self, name: impl Into<String>, schema: S) -> Collection<S> {
        Collection::new(name, schema, self.clone())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("classifier", &self.classifier)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
