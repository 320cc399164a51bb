//! Tracing setup for the binary.
//!
//! Events go to stderr through the `fmt` layer. When a [`StatusBus`] is given,
//! INFO and higher are also forwarded to it for the status bar and console.

use crate::error::{AppResult, GuiError};
use crate::status::{StatusBus, StatusLayer};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter from `--log-level`, else `RUST_LOG`, else `info`.
pub fn env_filter(level: Option<&str>) -> AppResult<EnvFilter> {
    match level {
        Some(directives) => EnvFilter::try_new(directives)
            .map_err(|err| GuiError::config("logging", "log_level", err.to_string())),
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::default().add_directive(Level::INFO.into()))),
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails when `level` is not a valid filter or a global subscriber is already
/// installed.
pub fn init(level: Option<&str>, status_bus: Option<StatusBus>) -> AppResult<()> {
    let filter = env_filter(level)?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(status_bus.map(StatusLayer::new))
        .try_init()
        .map_err(|err| GuiError::Gui(format!("failed to install logging: {}", err)))
}
