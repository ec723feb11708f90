//! Tracing subscriber setup used by the application.

use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::{
    non_blocking,
    non_blocking::NonBlocking,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter,
    fmt::{fmt, time::ChronoLocal, writer::MakeWriterExt},
};

use crate::error::AppError;

/// Guard to ensure buffered logs are flushed on shutdown.
static LOG_GUARD: OnceLock<non_blocking::WorkerGuard> = OnceLock::new();

const LOG_FILE_PREFIX: &str = "tentrackule-tft.log";

/// Installs the global subscriber: human readable or JSON on stdout, plus a
/// daily rolling file when `log_dir` is set.
pub fn init(json: bool, log_dir: Option<&Path>, max_files: Option<usize>) -> Result<(), AppError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt()
        .with_env_filter(env_filter)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(false)
        .with_ansi(!json && log_dir.is_none())
        .with_level(true);

    let result = match (log_dir, json) {
        (Some(dir), json) => {
            let stdout = std::io::stdout.with_max_level(tracing::Level::INFO);
            let writer = stdout.and(init_file_writer(dir, max_files)?);

            if json {
                builder.json().with_writer(writer).try_init()
            } else {
                builder.with_writer(writer).try_init()
            }
        }
        (None, true) => builder.json().try_init(),
        (None, false) => builder.try_init(),
    };
    result.map_err(|e| AppError::Logging(e.to_string()))?;

    tracing::info!(json, file = log_dir.is_some(), "logger initialized");
    Ok(())
}

fn init_file_writer(dir: &Path, max_files: Option<usize>) -> Result<NonBlocking, AppError> {
    let mut file_builder = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX);

    if let Some(n) = max_files {
        file_builder = file_builder.max_log_files(n);
    }

    let file_appender = file_builder
        .build(dir)
        .map_err(|e| AppError::Logging(format!("failed to create log file in {}: {e}", dir.display())))?;

    let (file_writer, guard) = non_blocking(file_appender);

    LOG_GUARD
        .set(guard)
        .map_err(|_| AppError::Logging("logger already initialized".into()))?;

    Ok(file_writer)
}
