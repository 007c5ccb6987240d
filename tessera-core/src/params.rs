//! Query parameters for collection reads.
//!
//! Callers build [`ListParams`] / [`RecordParams`] with optional fields; the
//! accessor resolves them into [`ListQuery`] / [`RecordQuery`] with defaults
//! applied before consulting the cache or the backend.

use serde::{Deserialize, Serialize};

use crate::filter::Filter;

/// Page size used when the caller does not pick one.
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Sort order used when the caller does not pick one (newest first).
pub const DEFAULT_SORT: &str = "-created";

/// Caller-facing list parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub sort: Option<String>,
    pub filter: Option<Filter>,
    pub expand: Option<String>,
    pub fields: Option<String>,
}

impl ListParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_expand(mut self, expand: impl Into<String>) -> Self {
        self.expand = Some(expand.into());
        self
    }

    pub fn with_fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = Some(fields.into());
        self
    }

    /// Apply defaults and serialize the filter.
    pub fn resolve(&self) -> ListQuery {
        ListQuery {
            page: self.page.unwrap_or(1).max(1),
            per_page: self.per_page.unwrap_or(DEFAULT_PER_PAGE),
            sort: self
                .sort
                .clone()
                .unwrap_or_else(|| DEFAULT_SORT.to_string()),
            filter: self
                .filter
                .as_ref()
                .map(Filter::to_expression)
                .filter(|expr| !expr.is_empty()),
            expand: non_blank(self.expand.as_deref()),
            fields: non_blank(self.fields.as_deref()),
        }
    }
}

/// Resolved list query, as sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListQuery {
    pub page: u32,
    pub per_page: u32,
    pub sort: String,
    pub filter: Option<String>,
    pub expand: Option<String>,
    pub fields: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        ListParams::default().resolve()
    }
}

/// Caller-facing single-record parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordParams {
    pub expand: Option<String>,
    pub fields: Option<String>,
}

impl RecordParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expand(mut self, expand: impl Into<String>) -> Self {
        self.expand = Some(expand.into());
        self
    }

    pub fn with_fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = Some(fields.into());
        self
    }

    pub fn resolve(&self) -> RecordQuery {
        RecordQuery {
            expand: non_blank(self.expand.as_deref()),
            fields: non_blank(self.fields.as_deref()),
        }
    }
}

/// Resolved single-record query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordQuery {
    pub expand: Option<String>,
    pub fields: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_resolve() {
        let query = ListParams::new().resolve();
        assert_eq!(query.page, 1);
        assert_eq!(query.per_page, DEFAULT_PER_PAGE);
        assert_eq!(query.sort, "-created");
        assert_eq!(query.filter, None);
    }

    #[test]
    fn test_explicit_defaults_resolve_identically() {
        let implicit = ListParams::new().resolve();
        let explicit = ListParams::new()
            .with_page(1)
            .with_per_page(20)
            .with_sort("-created")
            .with_expand("  ")
            .resolve();
        assert_eq!(implicit, explicit);
    }

    #[test]
    fn test_empty_filter_is_dropped() {
        let query = ListParams::new().with_filter(Filter::all([])).resolve();
        assert_eq!(query.filter, None);

        let query = ListParams::new().with_filter(Filter::eq("status", "open")).resolve();
        assert_eq!(query.filter.as_deref(), Some(r#"status = "open""#));
    }
}
