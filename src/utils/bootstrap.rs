//! Bootstrap utilities for saga storage binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LOG_ENV_VAR;

/// Filter used when SAGA_STORAGE_LOG is unset or unparseable.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Tracing filter from SAGA_STORAGE_LOG, falling back to `DEFAULT_LOG_FILTER`.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Install the global fmt subscriber.
///
/// Call once, at the top of `main`.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
