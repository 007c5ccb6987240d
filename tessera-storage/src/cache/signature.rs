//! Query signatures: the cache key for a collection read.
//!
//! A signature combines the collection name, the operation name and a
//! canonical rendering of the resolved query parameters. Canonical means
//! object keys are sorted recursively, so two structurally equal parameter
//! sets always produce the same signature regardless of field order.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

/// Cache key for one read operation on one collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuerySignature {
    /// Private inner data; build through [`QuerySignature::new`].
    inner: SignatureInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SignatureInner {
    collection: String,
    operation: &'static str,
    params: String,
}

impl QuerySignature {
    /// Build a signature from any serializable parameter set.
    pub fn new<P>(collection: &str, operation: &'static str, params: &P) -> serde_json::Result<Self>
    where
        P: Serialize + ?Sized,
    {
        let value = serde_json::to_value(params)?;
        Ok(Self {
            inner: SignatureInner {
                collection: collection.to_string(),
                operation,
                params: canonical_json(&value),
            },
        })
    }

    pub fn collection(&self) -> &str {
        &self.inner.collection
    }

    pub fn operation(&self) -> &'static str {
        self.inner.operation
    }

    /// Canonical JSON of the parameters.
    pub fn params(&self) -> &str {
        &self.inner.params
    }
}

impl fmt::Display for QuerySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.inner.collection, self.inner.operation, self.inner.params
        )
    }
}

/// Render `value` as JSON with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    canonicalize(value).to_string()
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_does_not_matter() -> serde_json::Result<()> {
        let a: Value = serde_json::from_str(r#"{"page":1,"perPage":20,"nested":{"b":2,"a":1}}"#)?;
        let b: Value = serde_json::from_str(r#"{"nested":{"a":1,"b":2},"perPage":20,"page":1}"#)?;

        let sig_a = QuerySignature::new("events", "list", &a)?;
        let sig_b = QuerySignature::new("events", "list", &b)?;
        assert_eq!(sig_a, sig_b);
        assert_eq!(sig_a.to_string(), sig_b.to_string());
        Ok(())
    }

    #[test]
    fn test_collection_and_operation_separate_keys() -> serde_json::Result<()> {
        let params = json!({"page": 1});
        let list = QuerySignature::new("events", "list", &params)?;
        let count = QuerySignature::new("events", "count", &params)?;
        let other = QuerySignature::new("tickets", "list", &params)?;

        assert_ne!(list, count);
        assert_ne!(list, other);
        assert_eq!(list.collection(), "events");
        assert_eq!(count.operation(), "count");
        Ok(())
    }

    #[test]
    fn test_display_format() -> serde_json::Result<()> {
        let sig = QuerySignature::new("events", "getOne", &json!({"id": "x1"}))?;
        assert_eq!(sig.to_string(), r#"events:getOne:{"id":"x1"}"#);
        assert_eq!(sig.params(), r#"{"id":"x1"}"#);
        Ok(())
    }
}
