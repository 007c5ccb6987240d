//! Filter expressions for list and search queries
//!
//! Filters are built as an AST and serialized to the backend's boolean
//! expression language (`field OP "value"` clauses joined by `&&` / `||`).
//! String values are always quoted and escaped during serialization, so a
//! value containing quotes cannot terminate its literal or inject clauses.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Filter operator for field comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    /// Equal to
    Eq,
    /// Not equal to
    Ne,
    /// Greater than
    Gt,
    /// Less than
    Lt,
    /// Greater than or equal
    Gte,
    /// Less than or equal
    Lte,
    /// Contains substring
    Contains,
    /// Does not contain substring
    NotContains,
}

impl FilterOperator {
    /// The operator as written in a filter expression.
    pub fn symbol(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::Ne => "!=",
            FilterOperator::Gt => ">",
            FilterOperator::Lt => "<",
            FilterOperator::Gte => ">=",
            FilterOperator::Lte => "<=",
            FilterOperator::Contains => "~",
            FilterOperator::NotContains => "!~",
        }
    }
}

/// A literal on the right-hand side of a clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterValue {
    String(String),
    Number(serde_json::Number),
    Bool(bool),
    Null,
}

impl FilterValue {
    fn render(&self) -> String {
        match self {
            FilterValue::String(s) => quote(s),
            FilterValue::Number(n) => n.to_string(),
            FilterValue::Bool(b) => b.to_string(),
            FilterValue::Null => "null".to_string(),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::String(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::String(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Number(value.into())
    }
}

impl From<u64> for FilterValue {
    fn from(value: u64) -> Self {
        FilterValue::Number(value.into())
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map(FilterValue::Number)
            .unwrap_or(FilterValue::Null)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

/// Quote a string literal, escaping backslashes and double quotes.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

/// A single `field OP value` comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterExpr {
    /// Field to filter on
    pub field: String,
    /// Operator to apply
    pub operator: FilterOperator,
    /// Value to compare against
    pub value: FilterValue,
}

impl FilterExpr {
    pub fn new(
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    fn render(&self) -> String {
        format!("{} {} {}", self.field, self.operator.symbol(), self.value.render())
    }
}

/// Boolean filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    Clause(FilterExpr),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    /// Pre-built expression, emitted verbatim (parenthesized when combined).
    /// Never build one from user input.
    Raw(String),
}

impl Filter {
    pub fn clause(
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<FilterValue>,
    ) -> Self {
        Filter::Clause(FilterExpr::new(field, operator, value))
    }

    pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::clause(field, FilterOperator::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::clause(field, FilterOperator::Ne, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::clause(field, FilterOperator::Gte, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::clause(field, FilterOperator::Lte, value)
    }

    pub fn contains(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::clause(field, FilterOperator::Contains, value)
    }

    pub fn raw(expression: impl Into<String>) -> Self {
        Filter::Raw(expression.into())
    }

    /// Conjunction of every filter in `filters`.
    pub fn all(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    /// Disjunction of every filter in `filters`.
    pub fn any(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    /// `self && other`.
    pub fn and(self, other: Filter) -> Self {
        Filter::And(vec![self, other])
    }

    /// True when the filter serializes to nothing.
    pub fn is_empty(&self) -> bool {
        self.render().is_none()
    }

    /// Serialize to the backend expression language. Empty filters yield `""`.
    pub fn to_expression(&self) -> String {
        self.render().map(|(expr, _)| expr).unwrap_or_default()
    }

    /// Rendered expression plus whether it needs parentheses when nested.
    fn render(&self) -> Option<(String, bool)> {
        match self {
            Filter::Clause(expr) => Some((expr.render(), false)),
            Filter::Raw(expr) => {
                let trimmed = expr.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some((trimmed.to_string(), true))
                }
            }
            Filter::And(parts) => join(parts, " && ", true),
            Filter::Or(parts) => join(parts, " || ", false),
        }
    }
}

fn join(parts: &[Filter], separator: &str, wrap_all: bool) -> Option<(String, bool)> {
    let mut rendered: Vec<(String, bool)> = parts.iter().filter_map(Filter::render).collect();
    match rendered.len() {
        0 => None,
        1 => rendered.pop(),
        _ => {
            let joined = rendered
                .into_iter()
                .map(|(expr, compound)| {
                    if wrap_all || compound {
                        format!("({})", expr)
                    } else {
                        expr
                    }
                })
                .collect::<Vec<_>>()
                .join(separator);
            Some((joined, true))
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_expression())
    }
}
