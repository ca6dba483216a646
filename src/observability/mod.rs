//! Observability: structured logging.
//!
//! Checks and stores emit `tracing` spans and events and `metrics` counters
//! and histograms. This module installs the log subscriber; exporting metrics
//! is left to the embedding application's recorder.

mod logging;

pub use logging::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig};

use crate::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Installs the global log subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. Calls after the first
/// successful one are no-ops.
///
/// # Errors
///
/// Returns an error if the filter directive is invalid, the log file cannot be
/// opened, or another subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    if LOGGING_INIT.get().is_some() {
        return Ok(());
    }

    let filter = build_filter(&config.level)?;
    let registry = tracing_subscriber::registry().with(filter);

    match (&config.file, config.format) {
        (Some(log_file), LogFormat::Json) => {
            let writer = open_log_file(log_file)?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(writer)
                        .with_current_span(true)
                        .with_span_list(true)
                        .with_target(true),
                )
                .try_init()
                .map_err(init_error)?;
        },
        (Some(log_file), LogFormat::Pretty | LogFormat::Compact) => {
            let writer = open_log_file(log_file)?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_target(true),
                )
                .try_init()
                .map_err(init_error)?;
        },
        (None, LogFormat::Json) => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(io::stderr)
                        .with_current_span(true)
                        .with_span_list(true)
                        .with_target(true),
                )
                .try_init()
                .map_err(init_error)?;
        },
        (None, LogFormat::Pretty) => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(io::stderr)
                        .with_target(true),
                )
                .try_init()
                .map_err(init_error)?;
        },
        (None, LogFormat::Compact) => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_writer(io::stderr)
                        .with_target(true),
                )
                .try_init()
                .map_err(init_error)?;
        },
    }

    let _ = LOGGING_INIT.set(());
    tracing::debug!(format = %config.format, level = %config.level, "logging initialized");
    Ok(())
}

/// Builds the env filter, preferring `RUST_LOG` when set.
fn build_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| Error::InvalidInput(format!("log level '{level}': {e}")))
}

/// Thread-safe file writer for logging.
#[derive(Clone)]
struct LogFileWriter {
    file: Arc<Mutex<File>>,
}

impl Write for LogFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .file
            .lock()
            .map_err(|e| io::Error::other(e.to_string()))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .map_err(|e| io::Error::other(e.to_string()))?;
        guard.flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogFileWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Opens a log file for appending, creating parent directories.
fn open_log_file(path: &Path) -> Result<LogFileWriter> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
            operation: "create_log_dir".to_string(),
            cause: e.to_string(),
        })?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::OperationFailed {
            operation: "open_log_file".to_string(),
            cause: format!("{}: {}", path.display(), e),
        })?;

    Ok(LogFileWriter {
        file: Arc::new(Mutex::new(file)),
    })
}

#[allow(clippy::needless_pass_by_value)]
fn init_error(e: tracing_subscriber::util::TryInitError) -> Error {
    Error::OperationFailed {
        operation: "logging_init".to_string(),
        cause: e.to_string(),
    }
}
