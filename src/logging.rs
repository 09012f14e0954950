use std::io;
use std::path::PathBuf;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "githook_relay";

pub struct FileLogger {
    log_directory: PathBuf,
    max_files: usize,
    rotation: Rotation,
}

impl FileLogger {
    pub fn new(log_directory: PathBuf) -> Self {
        Self {
            log_directory,
            max_files: 5,
            rotation: Rotation::DAILY,
        }
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Non-blocking writer into a rolling file; keep the guard alive to flush.
    pub fn setup_file_logging(&self) -> io::Result<(NonBlocking, WorkerGuard)> {
        std::fs::create_dir_all(&self.log_directory)?;

        let file_appender = RollingFileAppender::builder()
            .rotation(self.rotation.clone())
            .filename_prefix(LOG_FILE_PREFIX)
            .max_log_files(self.max_files)
            .build(&self.log_directory)
            .map_err(io::Error::other)?;

        Ok(tracing_appender::non_blocking(file_appender))
    }
}

/// `RUST_LOG` wins over the configured filter.
fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber: console output, plus rolling files when a
/// log directory is configured.
pub fn setup_logging(config: &LoggingConfig) -> io::Result<Option<WorkerGuard>> {
    let console = tracing_subscriber::fmt::layer();

    match &config.directory {
        Some(directory) => {
            let (file_writer, guard) = FileLogger::new(directory.clone())
                .with_max_files(config.max_files)
                .setup_file_logging()?;

            tracing_subscriber::registry()
                .with(env_filter(config))
                .with(console)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(file_writer)
                        .with_ansi(false), // Disable ANSI colors for file logs
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter(config))
                .with(console)
                .init();
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_logger_creates_directory() {
        let dir = std::env::temp_dir().join(format!("githook_relay_logs_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let (_writer, guard) = FileLogger::new(dir.clone())
            .with_rotation(Rotation::NEVER)
            .with_max_files(2)
            .setup_file_logging()
            .unwrap();
        drop(guard);

        assert!(dir.is_dir());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn falls_back_to_info_on_bad_filter() {
        let config = LoggingConfig {
            filter: "not a [valid filter".into(),
            ..LoggingConfig::default()
        };
        // only checks that building never panics
        let _ = env_filter(&config);
    }
}
