//! TESSERA Client - HTTP Backend and Session Setup
//!
//! Connects the storage layer to a remote server: [`HttpBackend`] implements
//! [`CollectionBackend`](tessera_storage::CollectionBackend) over REST with
//! a server-sent-event change feed, [`ClientConfig`] loads connection
//! settings from TOML and [`telemetry`] installs the tracing subscriber.

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod realtime;
pub mod telemetry;

use std::sync::Arc;

use tessera_core::{ErrorClassifier, ErrorSink};
use tessera_storage::Session;

pub use auth::AuthStore;
pub use config::{AuthConfig, CacheSettings, ClientConfig, ConfigError, ReconnectConfig};
pub use error::{ClientError, ClientResult};
pub use http::HttpBackend;
pub use realtime::{Backoff, RealtimeConnector, SseEvent, SseParser};
pub use telemetry::{init_tracing, TelemetryConfig};

/// Build a session backed by HTTP.
///
/// The returned [`AuthStore`] is shared with the backend; setting a token on
/// it applies to every later request.
pub fn connect(config: &ClientConfig, sink: Arc<dyn ErrorSink>) -> ClientResult<(Session, AuthStore)> {
    let auth = match &config.auth.token {
        Some(token) => AuthStore::with_token(token.clone()),
        None => AuthStore::new(),
    };
    let backend = HttpBackend::new(config, auth.clone())?;
    let classifier = ErrorClassifier::new(config.environment(), sink);
    let session = Session::new(Arc::new(backend), classifier).with_cache_config(config.cache_config());

    tracing::debug!(
        base_url = %config.base_url,
        environment = %config.environment(),
        auto_cancellation = config.auto_cancellation,
        "session ready"
    );
    Ok((session, auth))
}
