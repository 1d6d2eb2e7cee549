use std::io;

use serde::Deserialize;
use serde::Serialize;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// `[logging]` section of the client config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log file stem; files roll hourly as `<app_name>.log.<date-hour>`
    pub app_name: String,
    pub log_dir: String,
    /// Fallback level when `RUST_LOG` is unset
    pub level: String,
    /// Mirror logs to stdout with colours
    pub stdout: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { app_name: "cx_client".to_string(), log_dir: "logs".to_string(), level: "info".to_string(), stdout: true }
    }
}

impl LoggingConfig {
    pub fn level(&self) -> Level {
        self.level.parse().unwrap_or(Level::INFO)
    }
}

fn env_filter(default_level: Level) -> EnvFilter {
    EnvFilter::builder().with_default_directive(default_level.into()).from_env_lossy()
}

/// Install the global subscriber: hourly non-blocking file output, plus stdout when enabled
///
/// Keep the returned guard alive for the life of the process or buffered lines are lost.
pub fn init(config: &LoggingConfig) -> WorkerGuard {
    let _ = std::fs::create_dir_all(&config.log_dir);

    let file_appender = tracing_appender::rolling::hourly(&config.log_dir, format!("{}.log", config.app_name));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer =
        fmt::layer().with_writer(non_blocking).with_target(true).with_thread_ids(true).with_line_number(true).with_ansi(false).compact();

    let stdout_layer = config
        .stdout
        .then(|| fmt::layer().with_writer(io::stdout).with_target(true).with_thread_ids(true).with_line_number(true).with_ansi(true).compact());

    tracing_subscriber::registry().with(env_filter(config.level())).with(file_layer).with(stdout_layer).init();

    guard
}

/// Stdout-only subscriber for short-lived tools
pub fn init_stdout(default_level: Level) {
    let stdout_layer = fmt::layer().with_writer(io::stdout).with_target(false).with_ansi(true).compact();
    tracing_subscriber::registry().with(env_filter(default_level)).with(stdout_layer).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!(LoggingConfig::default().level(), Level::INFO);
        assert_eq!(LoggingConfig { level: "debug".to_string(), ..Default::default() }.level(), Level::DEBUG);
        assert_eq!(LoggingConfig { level: "WARN".to_string(), ..Default::default() }.level(), Level::WARN);
        assert_eq!(LoggingConfig { level: "chatty".to_string(), ..Default::default() }.level(), Level::INFO);
    }
}
