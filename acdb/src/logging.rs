//! Tracing subscriber setup.
//!
//! Logs go to stderr and, when `logging.directory` is configured, to a daily
//! rotated `acdb.log` file in that directory. `RUST_LOG` overrides the
//! configured level.

use std::io;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{AcdbError, AcdbResult};

/// Log file name prefix; the appender adds the date.
pub const LOG_FILE_NAME: &str = "acdb.log";

/// Keeps the background file writer alive. Hold it until exit or buffered
/// lines are lost.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// Fails if the level is not a valid filter directive, the log directory
/// cannot be created, or a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> AcdbResult<LoggingGuard> {
    let filter = build_filter(config, std::env::var(EnvFilter::DEFAULT_ENV).ok())?;

    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_timer(LocalTime::rfc_3339())
        .with_target(false);

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory).map_err(|e| AcdbError::storage(directory, e))?;
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(LocalTime::rfc_3339());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| AcdbError::Config(format!("failed to initialize logging: {}", e)))?;

    Ok(LoggingGuard { _file: guard })
}

/// Filter from `RUST_LOG` when set, else from the configured level.
fn build_filter(config: &LoggingConfig, env: Option<String>) -> AcdbResult<EnvFilter> {
    let directives = env
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| config.level.clone());
    EnvFilter::try_new(&directives)
        .map_err(|e| AcdbError::Config(format!("invalid log level '{}': {}", directives, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(level: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.to_string(),
            directory: None,
        }
    }

    #[test]
    fn test_configured_level() {
        let filter = build_filter(&config("debug"), None).unwrap();
        assert!(filter.to_string().contains("debug"));
    }

    #[test]
    fn test_env_overrides_level() {
        let filter = build_filter(&config("info"), Some("acdb=trace".to_string())).unwrap();
        assert!(filter.to_string().contains("acdb=trace"));
    }

    #[test]
    fn test_blank_env_ignored() {
        let filter = build_filter(&config("warn"), Some("  ".to_string())).unwrap();
        assert!(filter.to_string().contains("warn"));
    }

    #[test]
    fn test_invalid_level() {
        let err = build_filter(&config("acdb=loud"), None).unwrap_err();
        assert!(matches!(err, AcdbError::Config(_)));
    }
}
