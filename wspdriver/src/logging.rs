use crate::config::LogConfig;
use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_FILE_NAME: &str = "wspdriver.log";

/// Keeps the file writer flushing; drop it only when the process exits.
pub struct LogGuard(pub WorkerGuard);

pub fn build_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_new(config.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init_logging(config: &LogConfig) -> Result<Option<LogGuard>> {
    let filter = build_filter(config);

    if config.to_file {
        let log_dir = config.log_dir();
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
        let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
        let (writer, guard) = tracing_appender::non_blocking(file_appender);
        fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .try_init()
            .map_err(anyhow::Error::msg)?;
        Ok(Some(LogGuard(guard)))
    } else {
        fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(anyhow::Error::msg)?;
        Ok(None)
    }
}
