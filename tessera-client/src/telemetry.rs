//! Tracing subscriber setup.
//!
//! Development logs are human-readable; production logs are JSON lines.
//! `RUST_LOG` overrides the configured filter.

use tessera_core::Environment;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ClientError, ClientResult};

/// Filter used in development when `TESSERA_LOG` and `RUST_LOG` are unset.
pub const DEV_FILTER: &str = "tessera=debug,info";

/// Filter used in production when `TESSERA_LOG` and `RUST_LOG` are unset.
pub const PROD_FILTER: &str = "tessera=info,warn";

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub environment: Environment,
    /// `EnvFilter` directives.
    pub filter: String,
    /// Emit JSON lines instead of the pretty format.
    pub json: bool,
}

impl TelemetryConfig {
    pub fn for_environment(environment: Environment) -> Self {
        let filter = std::env::var("TESSERA_LOG").unwrap_or_else(|_| {
            if environment.is_production() {
                PROD_FILTER.to_string()
            } else {
                DEV_FILTER.to_string()
            }
        });
        Self {
            environment,
            filter,
            json: environment.is_production(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::for_environment(Environment::from_env())
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(config: &TelemetryConfig) -> ClientResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let json_layer = config.json.then(|| tracing_subscriber::fmt::layer().json());
    let text_layer = (!config.json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| ClientError::Telemetry(e.to_string()))?;

    tracing::info!(
        environment = %config.environment,
        json = config.json,
        "Telemetry initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_uses_json() {
        let config = TelemetryConfig::for_environment(Environment::Production);
        assert!(config.json);

        let config = TelemetryConfig::for_environment(Environment::Development);
        assert!(!config.json);
    }
}
