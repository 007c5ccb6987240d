//! Failure classification.
//!
//! Backends, hooks and decoders report raw [`Failure`] values. The
//! [`ErrorClassifier`] is the only place those become [`AppError`]s: it maps
//! the shape of the failure onto an [`ErrorKind`], logs the result, and hands
//! it to the configured [`ErrorSink`]. Classification is total; it never
//! fails and never panics.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Environment;
use crate::error::{AppError, ErrorKind, FieldReasons};
use crate::sink::{ErrorSink, TracingSink};

/// Log target for classified errors.
pub const ERROR_LOG_TARGET: &str = "tessera::errors";

/// Messages that identify a transport failure when no status is available.
const NETWORK_PHRASES: &[&str] = &[
    "fetch failed",
    "network request failed",
    "connection refused",
];

/// Error body reported by the backend: `{status, message, data}`.
///
/// Older servers name the status field `code`; both spellings are accepted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BackendErrorPayload {
    #[serde(alias = "code")]
    pub status: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl BackendErrorPayload {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: serde_json::Map::new(),
        }
    }

    /// Attach a field (or `resource`) entry to the payload data.
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

/// An unclassified failure, as raised by a backend, hook or decoder.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Failure {
    /// Already classified; passes through unchanged.
    #[error(transparent)]
    App(#[from] AppError),

    /// The backend answered with an error status.
    #[error("backend responded with status {}: {}", .0.status, .0.message)]
    Backend(BackendErrorPayload),

    /// The request never produced a response.
    #[error("transport failure: {message}")]
    Transport { message: String, aborted: bool },

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl Failure {
    pub fn transport(message: impl Into<String>) -> Self {
        Failure::Transport {
            message: message.into(),
            aborted: false,
        }
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Failure::Transport {
            message: message.into(),
            aborted: true,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Failure::Other(message.into())
    }

    /// HTTP status carried by the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Failure::App(err) => Some(err.http_status),
            Failure::Backend(payload) => Some(payload.status),
            Failure::Transport { .. } | Failure::Other(_) => None,
        }
    }

    /// True for transport failures, aborts, status 0 and known network messages.
    pub fn is_network_error(&self) -> bool {
        match self {
            Failure::App(err) => err.kind == ErrorKind::Network,
            Failure::Backend(payload) => payload.status == 0,
            Failure::Transport { .. } => true,
            Failure::Other(message) => mentions_network(message),
        }
    }

    /// True for 401 responses and classified authentication errors.
    pub fn is_auth_error(&self) -> bool {
        match self {
            Failure::App(err) => err.kind == ErrorKind::Authentication,
            Failure::Backend(payload) => payload.status == 401,
            _ => false,
        }
    }

    /// True for 400 responses and classified validation errors.
    pub fn is_validation_error(&self) -> bool {
        match self {
            Failure::App(err) => err.kind == ErrorKind::Validation,
            Failure::Backend(payload) => payload.status == 400,
            _ => false,
        }
    }
}

impl From<BackendErrorPayload> for Failure {
    fn from(payload: BackendErrorPayload) -> Self {
        Failure::Backend(payload)
    }
}

impl From<serde_json::Error> for Failure {
    fn from(err: serde_json::Error) -> Self {
        Failure::Other(format!("serialization error: {}", err))
    }
}

fn mentions_network(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    NETWORK_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

/// Map a failure onto the taxonomy. Pure; does not log.
pub fn classify(failure: Failure) -> AppError {
    match failure {
        Failure::App(err) => err,
        Failure::Backend(payload) => classify_backend(payload),
        Failure::Transport { message, .. } => AppError::network(message),
        Failure::Other(message) if mentions_network(&message) => AppError::network(message),
        Failure::Other(message) => AppError::unknown(message),
    }
}

fn classify_backend(payload: BackendErrorPayload) -> AppError {
    let BackendErrorPayload {
        status,
        message,
        data,
    } = payload;

    match status {
        0 => AppError::network(message),
        400 => {
            let details: FieldReasons = data.into_iter().collect();
            AppError::validation(non_empty(message, "Request failed"), details)
        }
        401 => AppError::authentication(message),
        403 => AppError::authorization(message),
        404 => {
            let resource = data
                .get("resource")
                .and_then(|value| value.as_str())
                .filter(|value| !value.trim().is_empty())
                .unwrap_or("Resource");
            AppError::not_found(resource)
        }
        other => AppError::http(other, message),
    }
}

fn non_empty(message: String, default: &str) -> String {
    if message.trim().is_empty() {
        default.to_string()
    } else {
        message
    }
}

/// Classifies, logs and reports failures.
///
/// Cheap to clone; clones share the sink.
#[derive(Clone)]
pub struct ErrorClassifier {
    environment: Environment,
    sink: Arc<dyn ErrorSink>,
}

impl ErrorClassifier {
    pub fn new(environment: Environment, sink: Arc<dyn ErrorSink>) -> Self {
        Self { environment, sink }
    }

    /// Classifier that reports to [`TracingSink`].
    pub fn with_tracing(environment: Environment) -> Self {
        Self::new(environment, Arc::new(TracingSink))
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Classify a failure, log it once and forward it to the sink once.
    ///
    /// Already-classified errors pass through unchanged but are still logged
    /// and reported.
    pub fn handle(&self, failure: impl Into<Failure>) -> AppError {
        let error = classify(failure.into());
        self.report(&error);
        error
    }

    /// Classify a failure and return its display-safe message.
    pub fn user_message(&self, failure: impl Into<Failure>) -> String {
        self.handle(failure).user_message
    }

    fn report(&self, error: &AppError) {
        match self.environment {
            Environment::Development => {
                tracing::error!(
                    target: ERROR_LOG_TARGET,
                    kind = %error.kind,
                    code = %error.code,
                    error_message = %error.message,
                    user_message = %error.user_message,
                    http_status = error.http_status,
                    details = ?error.details,
                    "classified error"
                );
            }
            Environment::Production => {
                tracing::error!(
                    target: ERROR_LOG_TARGET,
                    "{} error (code: {}, status: {})",
                    error.kind,
                    error.code,
                    error.http_status
                );
            }
        }
        self.sink.capture(error);
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::with_tracing(Environment::from_env())
    }
}

impl fmt::Debug for ErrorClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorClassifier")
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}
