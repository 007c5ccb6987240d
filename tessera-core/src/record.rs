//! Entity records, paginated results and change events

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A record type stored in a backend collection.
///
/// Shapes are defined by the domain module that owns the collection; the
/// data-access layer only needs the record identity.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Unique record identifier.
    fn id(&self) -> &str;
}

/// Untyped record: identity and timestamps plus an open field bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Record {
    /// Look up a field by name.
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.fields.get(field)
    }

    /// Look up a string field by name.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|value| value.as_str())
    }
}

impl Entity for Record {
    fn id(&self) -> &str {
        &self.id
    }
}

/// One page of a list query.
///
/// `total_pages` is always derived from `total` and `per_page`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> ListResult<T> {
    pub fn new(items: Vec<T>, total: u64, page: u32, per_page: u32) -> Self {
        let total = total.max(items.len() as u64);
        Self {
            items,
            total,
            page,
            per_page,
            total_pages: total_pages(total, per_page),
        }
    }

    /// Empty result for the given page.
    pub fn empty(page: u32, per_page: u32) -> Self {
        Self::new(Vec::new(), 0, page, per_page)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    /// Convert every item, keeping paging metadata. Stops at the first error.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<ListResult<U>, E> {
        let items = self.items.into_iter().map(f).collect::<Result<Vec<U>, E>>()?;
        Ok(ListResult {
            items,
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
        })
    }
}

/// `ceil(total / per_page)`, or 0 when `per_page` is 0.
pub fn total_pages(total: u64, per_page: u32) -> u32 {
    if per_page == 0 {
        return 0;
    }
    let pages = total.div_ceil(u64::from(per_page));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Kind of change delivered by the realtime feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
}

/// A realtime change on a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent<T> {
    pub action: ChangeAction,
    pub record: T,
}

impl<T> ChangeEvent<T> {
    pub fn new(action: ChangeAction, record: T) -> Self {
        Self { action, record }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(total_pages(1, 20), 1);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
        assert_eq!(total_pages(5, 0), 0);
    }

    #[test]
    fn test_total_never_below_item_count() {
        let result = ListResult::new(vec![1, 2, 3], 1, 1, 20);
        assert_eq!(result.total, 3);
        assert_eq!(result.total_pages, 1);
    }

    #[test]
    fn test_record_flattens_fields() -> Result<(), serde_json::Error> {
        let record: Record = serde_json::from_value(json!({
            "id": "abc123",
            "created": "2024-01-01 10:00:00.000Z",
            "updated": "2024-01-02 10:00:00.000Z",
            "title": "Spring fair",
            "seats": 40
        }))?;

        assert_eq!(record.id(), "abc123");
        assert_eq!(record.get_str("title"), Some("Spring fair"));
        assert_eq!(record.get("seats"), Some(&json!(40)));
        assert!(!record.fields.contains_key("id"));
        Ok(())
    }

    #[test]
    fn test_change_action_wire_names() -> Result<(), serde_json::Error> {
        let event: ChangeEvent<serde_json::Value> =
            serde_json::from_value(json!({"action": "delete", "record": {"id": "x"}}))?;
        assert_eq!(event.action, ChangeAction::Delete);
        Ok(())
    }
}
