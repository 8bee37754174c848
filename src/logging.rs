//! Tracing subscriber setup
//!
//! Logs go to stdout and, when a log directory is configured, to a rolling
//! file that keeps a bounded number of rotated files.

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps the background log writer alive
///
/// Dropping the guard flushes buffered file output, so hold it until the
/// process exits.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    file: Option<WorkerGuard>,
}

impl LogGuard {
    pub fn writes_file(&self) -> bool {
        self.file.is_some()
    }
}

/// Build the filter directive for the crate
///
/// `RUST_LOG` wins when set; otherwise `level` applies to this crate and
/// dependencies log warnings only.
pub fn build_filter(level: &str, verbose: bool) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let level = if verbose { "debug" } else { level };
    EnvFilter::try_new(format!("worldping={level},warn"))
        .with_context(|| format!("Invalid log level: {level}"))
}

/// Install the global subscriber
///
/// # Errors
///
/// Fails on an invalid level, an unusable log directory, or when a global
/// subscriber is already installed.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<LogGuard> {
    let filter = build_filter(&config.level, verbose)?;
    let json = config.format == "json";

    let mut layers: Vec<BoxedLayer> = Vec::new();

    let stdout = tracing_subscriber::fmt::layer().with_target(false);
    layers.push(if json {
        stdout.json().boxed()
    } else {
        stdout.boxed()
    });

    let mut file_guard = None;
    if let Some(dir) = &config.directory {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(&config.file_name)
            .max_log_files(config.max_files.max(1))
            .build(dir)
            .with_context(|| format!("Failed to open log file in {}", dir.display()))?;
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);

        let file = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        layers.push(if json { file.json().boxed() } else { file.boxed() });
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LogGuard { file: file_guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_levels() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        assert!(build_filter("info", false).is_ok());
        assert!(build_filter("info", true).is_ok());
        assert!(build_filter("not a level!", false).is_err());
    }
}
