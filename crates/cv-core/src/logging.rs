//! Logging initialization using the `tracing` ecosystem.
//!
//! Provides:
//! - Console output (human-readable or JSON lines)
//! - File output (daily rotation via `tracing-appender`, non-blocking writer)
//! - Configurable log level via env var `RUST_LOG` or explicit setting

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Console output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    /// Parse a config value; anything other than `"json"` falls back to pretty.
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("json") { Self::Json } else { Self::Pretty }
    }
}

/// Resolved logging settings.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Default level if `RUST_LOG` is not set (e.g. `"info"`).
    pub level: String,
    /// Optional directory for daily-rotating log files.
    pub dir: Option<String>,
    /// Log file prefix (e.g. `"cv-runner"`).
    pub file_prefix: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { level: "info".into(), dir: None, file_prefix: "cryptovault".into(), format: LogFormat::Pretty }
    }
}

/// Keeps the non-blocking file writer alive. Drop it only at process exit,
/// otherwise buffered file output is lost.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Initialize the global tracing subscriber.
///
/// Should be called once at program start. A second call returns an error
/// instead of panicking.
pub fn init_logging(settings: &LogSettings) -> Result<LogGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let console_layer = match settings.format {
        LogFormat::Pretty => fmt::layer().with_target(true).with_thread_ids(true).with_ansi(true).boxed(),
        LogFormat::Json => fmt::layer().json().with_target(true).with_current_span(false).boxed(),
    };

    let (file_layer, guard) = match settings.dir.as_deref() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, &settings.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false).with_target(true).with_thread_ids(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("global tracing subscriber already installed")?;

    Ok(LogGuard { _file: guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_from_name() {
        assert_eq!(LogFormat::from_name("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_name("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_name("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_name("whatever"), LogFormat::Pretty);
    }
}
