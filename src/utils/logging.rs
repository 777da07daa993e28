//! Structured logging setup
//!
//! Installs a global `tracing-subscriber` fmt subscriber driven by
//! [`LoggingConfig`]. `RUST_LOG` takes precedence over the configured level.

use crate::config::LoggingConfig;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber described by `config`.
///
/// Returns false when logging is disabled or another subscriber is already
/// installed, so calling it more than once is harmless.
pub fn init_logging(config: &LoggingConfig) -> bool {
    if !config.log_to_console {
        return false;
    }

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.log_level).into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json_format {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        info!(app = %config.app_name, level = %config.log_level, "Logging initialized");
    }
    installed
}
