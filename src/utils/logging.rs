//! Structured logging setup.
//!
//! Installs a global `tracing-subscriber` registry with a console fmt layer,
//! plain or JSON. `RUST_LOG`, when set, takes precedence over the configured
//! level. With console output off the registry still installs, so spans and
//! the filter behave the same but nothing is written.

use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{constants, BlazeError, Result};

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.log_level).into())
        .from_env_lossy();

    let console = config.log_to_console;
    let plain = (console && !config.json_format)
        .then(|| fmt::layer().with_target(true).with_thread_ids(true));
    let json = (console && config.json_format)
        .then(|| fmt::layer().json().with_target(true).with_thread_ids(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(json)
        .try_init()
        .map_err(|e| BlazeError::Custom(format!("{}: {e}", constants::ERR_LOGGING_INIT)))?;

    info!(
        app = %config.app_name,
        level = %config.log_level,
        json = config.json_format,
        console,
        "Logging initialized"
    );
    Ok(())
}
