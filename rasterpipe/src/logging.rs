//! Logging infrastructure.
//!
//! Structured logging with dual output:
//! - a dated file under `<workspace>/logs/<name>-YYYY-M-D.log`
//! - stdout for interactive tailing
//!
//! Filterable via the `RUST_LOG` environment variable.

use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::PipelineConfig;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping it flushes and closes the non-blocking file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Default log file name: the pipeline name plus the local date, so
/// consecutive daily runs append to the same file.
pub fn default_log_file(name: &str) -> String {
    format!("{}-{}.log", name, Local::now().format("%Y-%-m-%-d"))
}

/// Resolves the log directory and file name from the configuration.
pub fn log_path(config: &PipelineConfig) -> (PathBuf, String) {
    let dir = match &config.log.dir {
        Some(dir) if dir.is_absolute() => dir.clone(),
        Some(dir) => config.workspace.join(dir),
        None => config.workspace.join("logs"),
    };
    let file = config
        .log
        .file
        .clone()
        .unwrap_or_else(|| default_log_file(&config.name));
    (dir, file)
}

/// Initializes the global subscriber with a file layer and a stdout
/// layer. Returns the guard that keeps the file writer alive.
///
/// # Errors
///
/// Returns an error when the log directory cannot be created.
pub fn init_logging(config: &PipelineConfig) -> Result<LoggingGuard, io::Error> {
    let (dir, file) = log_path(config);
    fs::create_dir_all(&dir)?;

    let file_appender = tracing_appender::rolling::never(&dir, &file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(true);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(true);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Like [`init_logging`] but never fails the process over logging:
/// falls back to stdout-only when the directory cannot be created.
pub fn init_logging_or_stdout(config: &PipelineConfig) -> Option<LoggingGuard> {
    match init_logging(config) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("warning: file logging disabled: {err}");
            None
        }
    }
}
