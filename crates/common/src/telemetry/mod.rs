//! Tracing bootstrap
//!
//! The embedding crates only emit `tracing` events; installing a
//! subscriber is the host application's job. This helper wires one up
//! from [`ObservabilityConfig`] for binaries and integration tests.

use crate::config::ObservabilityConfig;
use tracing_subscriber::EnvFilter;

/// Install a global tracing subscriber from configuration.
///
/// `RUST_LOG` overrides the configured log level. Calling this twice is
/// harmless; the second call is a no-op.
pub fn init(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    if config.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
            .ok();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .ok();
    }
}
