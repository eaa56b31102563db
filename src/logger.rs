//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup, after the config has been loaded.

use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` wins when set and valid; otherwise the configured `level` is
/// used. `level` accepts standard level strings or full `EnvFilter`
/// directives (`"info,chat_relay=debug"`).
pub fn init(level: &str) -> Result<(), AppError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => parse_filter(level)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))?;

    Ok(())
}

/// Parse a level or directive string. Config loading uses this to reject a
/// bad `log_level` before the subscriber exists.
pub fn parse_filter(level: &str) -> Result<EnvFilter, AppError> {
    if level.trim().is_empty() {
        return Err(AppError::Logger("log level must not be empty".into()));
    }
    EnvFilter::try_new(level)
        .map_err(|e| AppError::Logger(format!("invalid log level '{level}': {e}")))
}
