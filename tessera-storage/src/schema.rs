//! Per-collection schema hooks.
//!
//! A [`CollectionSchema`] ties a collection to its typed [`Entity`] and lets
//! the owning domain module shape records on the way out and back in. The
//! wire format stays dynamic JSON; code above the accessor only sees typed
//! entities.

use std::fmt;
use std::marker::PhantomData;

use serde_json::{Map, Value};
use tessera_core::{Entity, Failure, Filter};

/// Fields searched when a schema does not name its own.
pub const DEFAULT_SEARCHABLE_FIELDS: &[&str] = &["title", "name", "description"];

pub trait CollectionSchema: Send + Sync + 'static {
    /// Typed record stored in the collection.
    type Entity: Entity;

    /// Reject bad input before `create`/`update`. Runs before
    /// [`transform_data`](Self::transform_data).
    fn validate(&self, _data: &Map<String, Value>) -> Result<(), Failure> {
        Ok(())
    }

    /// Shape outbound fields for the wire.
    fn transform_data(&self, data: Map<String, Value>) -> Result<Map<String, Value>, Failure> {
        Ok(data)
    }

    /// Shape an inbound record before it is decoded into [`Self::Entity`].
    fn transform_response(&self, record: Value) -> Result<Value, Failure> {
        Ok(record)
    }

    fn searchable_fields(&self) -> &[&str] {
        DEFAULT_SEARCHABLE_FIELDS
    }

    /// Filter for a free-text query: substring match on any searchable field.
    fn build_search_filter(&self, query: &str) -> Filter {
        Filter::any(
            self.searchable_fields()
                .iter()
                .map(|field| Filter::contains(*field, query)),
        )
    }
}

/// Schema that uses every default hook.
pub struct DefaultSchema<E> {
    _entity: PhantomData<fn() -> E>,
}

impl<E> DefaultSchema<E> {
    pub fn new() -> Self {
        Self {
            _entity: PhantomData,
        }
    }
}

impl<E> Default for DefaultSchema<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for DefaultSchema<E> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for DefaultSchema<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DefaultSchema")
    }
}

impl<E: Entity> CollectionSchema for DefaultSchema<E> {
    type Entity = E;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::Record;

    struct TitleOnly;

    impl CollectionSchema for TitleOnly {
        type Entity = Record;

        fn searchable_fields(&self) -> &[&str] {
            &["title"]
        }
    }

    #[test]
    fn test_default_search_filter() {
        let schema = DefaultSchema::<Record>::new();
        assert_eq!(
            schema.build_search_filter("fair").to_expression(),
            r#"title ~ "fair" || name ~ "fair" || description ~ "fair""#
        );
    }

    #[test]
    fn test_single_field_search_filter() {
        assert_eq!(
            TitleOnly.build_search_filter("alice").to_expression(),
            r#"title ~ "alice""#
        );
    }
}
