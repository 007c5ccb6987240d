//! Error Types for TESSERA Collection Access
//!
//! This module defines the closed error taxonomy shared by every collection
//! accessor:
//! - ErrorKind enum for categorizing failures
//! - AppError struct carrying diagnostic and user-facing messages
//!
//! Only `user_message` is meant for display. `message` and `details` are
//! diagnostic; `details` holds structured field reasons for validation
//! failures and nothing else.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Field name to backend-supplied reason, as reported by a validation failure.
pub type FieldReasons = BTreeMap<String, serde_json::Value>;

// ============================================================================
// ERROR KIND ENUM
// ============================================================================

/// The closed set of failure categories.
///
/// Each kind maps to a default code, HTTP status and curated user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Input rejected by a validation hook or by the backend (400)
    Validation,

    /// Caller is not authenticated (401)
    Authentication,

    /// Caller is authenticated but lacks permission (403)
    Authorization,

    /// Requested record or resource does not exist (404)
    NotFound,

    /// Transport-level failure with no HTTP status
    Network,

    /// Any other status or an unrecognised failure shape
    Generic,
}

impl ErrorKind {
    /// Get the default error code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Authentication => "AUTH_ERROR",
            ErrorKind::Authorization => "AUTHORIZATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Network => "NETWORK_ERROR",
            ErrorKind::Generic => "UNKNOWN_ERROR",
        }
    }

    /// Get the default HTTP status for this kind. Network failures have none (0).
    pub fn default_status(&self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::Authentication => 401,
            ErrorKind::Authorization => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Network => 0,
            ErrorKind::Generic => 500,
        }
    }

    /// Get the curated, display-safe message for this kind.
    pub fn default_user_message(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "Please check your input",
            ErrorKind::Authentication => "Please log in to continue",
            ErrorKind::Authorization => "You do not have permission to perform this action",
            ErrorKind::NotFound => "The requested resource was not found",
            ErrorKind::Network => "Unable to connect. Please check your internet connection",
            ErrorKind::Generic => "Something went wrong. Please try again",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// APP ERROR STRUCT
// ============================================================================

/// A classified failure.
///
/// Every accessor operation either succeeds or returns one of these.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind}: {message} (code: {code})")]
pub struct AppError {
    /// Failure category
    pub kind: ErrorKind,

    /// Machine-readable code, e.g. `NOT_FOUND` or `HTTP_502`
    pub code: String,

    /// Diagnostic message, may contain backend text
    pub message: String,

    /// Curated message that is safe to display
    pub user_message: String,

    /// HTTP status, 0 when the failure never reached the backend
    pub http_status: u16,

    /// Field-level reasons for validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<FieldReasons>,
}

impl AppError {
    /// Create an error of the given kind using its default code, status and user message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: kind.code().to_string(),
            message: message.into(),
            user_message: kind.default_user_message().to_string(),
            http_status: kind.default_status(),
            details: None,
        }
    }

    /// Attach field-level reasons.
    pub fn with_details(mut self, details: FieldReasons) -> Self {
        self.details = Some(details);
        self
    }

    // ========================================================================
    // Convenience constructors
    // ========================================================================

    /// Create a Validation error carrying field reasons.
    pub fn validation(message: impl Into<String>, details: FieldReasons) -> Self {
        Self::new(ErrorKind::Validation, message).with_details(details)
    }

    /// Create a Validation error for a single field.
    pub fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let mut details = FieldReasons::new();
        details.insert(field.to_string(), serde_json::Value::String(reason.clone()));
        Self::validation(format!("Invalid value for '{}': {}", field, reason), details)
    }

    /// Create an Authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, or_default(message, "Authentication failed"))
    }

    /// Create an Authorization error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authorization, or_default(message, "Access denied"))
    }

    /// Create a NotFound error for the named resource.
    pub fn not_found(resource: &str) -> Self {
        let mut err = Self::new(ErrorKind::NotFound, format!("{} not found", resource));
        err.user_message = format!("The requested {} was not found", resource.to_lowercase());
        err
    }

    /// Create a Network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, or_default(message, "Network error"))
    }

    /// Create a Generic error for an unrecognised failure.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Generic, or_default(message, "An unexpected error occurred"))
    }

    /// Create a Generic error for a backend status outside the classified set.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Generic,
            code: format!("HTTP_{}", status),
            message: or_default(message, "Request failed"),
            user_message: "An error occurred while processing your request".to_string(),
            http_status: status,
            details: None,
        }
    }

    // ========================================================================
    // Predicates
    // ========================================================================

    pub fn is_validation(&self) -> bool {
        self.kind == ErrorKind::Validation
    }

    pub fn is_auth(&self) -> bool {
        self.kind == ErrorKind::Authentication
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_network(&self) -> bool {
        self.kind == ErrorKind::Network
    }
}

fn or_default(message: impl Into<String>, default: &str) -> String {
    let message = message.into();
    if message.trim().is_empty() {
        default.to_string()
    } else {
        message
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for collection operations.
pub type AppResult<T> = Result<T, AppError>;
