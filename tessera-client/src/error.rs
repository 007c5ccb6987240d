//! Error types for client setup.
//!
//! Request failures never surface here; the backend reports them as
//! [`Failure`](tessera_core::Failure)s and the accessor classifies them.

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid base URL: {0}")]
    BaseUrl(String),
    #[error("Failed to initialize tracing: {0}")]
    Telemetry(String),
}

pub type ClientResult<T> = Result<T, ClientError>;
