//! Installs the process-wide `tracing` subscriber.

use tracing::debug;

use crate::config::{ConfigResult, LoggingConfig};

/// Installs a fmt subscriber at the configured level.
///
/// Returns false if a subscriber was already installed (tests, embedding
/// hosts); the existing one is kept.
///
/// # Errors
///
/// An invalid level in `config`.
pub fn init(config: &LoggingConfig) -> ConfigResult<bool> {
    let level = config.max_level()?;
    let installed = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .is_ok();
    if installed {
        debug!("Logging at {level}");
    }
    Ok(installed)
}
