//! Backend protocol for remote collections.
//!
//! A [`CollectionBackend`] is the transport seam: it knows how to list, fetch,
//! create, update and delete records in a named collection, and how to open a
//! change feed for it. It works on untyped JSON records and reports raw
//! [`Failure`]s; typing, caching and classification happen in
//! [`Collection`](crate::Collection).

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde_json::{Map, Value};
use tessera_core::{ChangeEvent, Failure, ListQuery, ListResult, RecordQuery};

/// Stream of change events for one collection subscription.
///
/// The subscription is released when the stream is dropped.
pub type ChangeFeed = BoxStream<'static, ChangeEvent<Value>>;

/// Result type for backend calls.
pub type BackendResult<T> = Result<T, Failure>;

/// Binary content sent alongside record fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Record field the file is attached to.
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(field: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            content_type: None,
            bytes,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Outbound write: record fields plus optional attachments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    pub fields: Map<String, Value>,
    pub attachments: Vec<Attachment>,
}

impl Payload {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            attachments: Vec::new(),
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// True when the payload must travel as multipart.
    pub fn is_multipart(&self) -> bool {
        !self.attachments.is_empty()
    }
}

/// Remote collection-oriented store.
///
/// Implementations must be cheap to share; the accessor holds them behind an
/// `Arc` and may issue calls concurrently.
#[async_trait]
pub trait CollectionBackend: Send + Sync {
    /// Fetch one page of records.
    async fn list(&self, collection: &str, query: &ListQuery) -> BackendResult<ListResult<Value>>;

    /// Fetch one record. Missing records are reported as a 404 failure.
    async fn get_one(&self, collection: &str, id: &str, query: &RecordQuery) -> BackendResult<Value>;

    /// Create a record and return it as stored.
    async fn create(&self, collection: &str, payload: Payload) -> BackendResult<Value>;

    /// Update a record and return it as stored.
    async fn update(&self, collection: &str, id: &str, payload: Payload) -> BackendResult<Value>;

    /// Delete a record.
    async fn delete(&self, collection: &str, id: &str) -> BackendResult<()>;

    /// Open a change feed for `topic` (`"*"` for every record).
    async fn subscribe(&self, collection: &str, topic: &str) -> BackendResult<ChangeFeed>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_multipart_only_with_attachments() {
        let mut fields = Map::new();
        fields.insert("title".to_string(), json!("Poster"));

        let plain = Payload::new(fields.clone());
        assert!(!plain.is_multipart());

        let with_file = Payload::new(fields)
            .with_attachments(vec![Attachment::new("cover", "cover.png", vec![1, 2, 3])
                .with_content_type("image/png")]);
        assert!(with_file.is_multipart());
        assert_eq!(with_file.attachments[0].content_type.as_deref(), Some("image/png"));
    }
}
