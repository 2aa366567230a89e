//! Logging setup for processes embedding the agent
//!
//! The library itself only emits `tracing` events; whoever drives the agent
//! calls [`init_default`] or [`LoggingConfig::init`] once at startup.
//!
//! ```no_run
//! use libmurmur::logging::{LogFormat, LoggingConfig};
//!
//! LoggingConfig::new(LogFormat::Json, "libmurmur=debug".to_string()).init();
//! ```

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

/// Environment variable selecting the output format
pub const LOG_FORMAT_ENV: &str = "MURMUR_LOG_FORMAT";
/// Environment variable holding the filter directive
pub const LOG_LEVEL_ENV: &str = "MURMUR_LOG_LEVEL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Plain lines, no colors
    Text,
    /// One JSON object per line
    Json,
    /// Multi-line colored output for development
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        };
        f.write_str(name)
    }
}

pub struct LoggingConfig {
    pub format: LogFormat,
    /// `EnvFilter` directive, e.g. `info` or `libmurmur::pipeline=debug`
    pub directive: String,
}

impl LoggingConfig {
    pub fn new(format: LogFormat, directive: String) -> Self {
        Self { format, directive }
    }

    /// Read format and directive from the environment, defaulting to text at `info`
    pub fn from_env() -> Self {
        let format = std::env::var(LOG_FORMAT_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(LogFormat::Text);
        let directive = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "info".to_string());
        Self::new(format, directive)
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.directive).unwrap_or_else(|_| EnvFilter::new("info"))
    }

    /// Install the global subscriber
    ///
    /// Returns `false` when a subscriber was already installed, which happens
    /// when several tests in one binary initialize logging.
    pub fn init(&self) -> bool {
        let filter = self.filter();
        let result = match self.format {
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .flatten_event(true)
                .with_target(true)
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_line_number(true)
                .try_init(),
            LogFormat::Text => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(false)
                .try_init(),
        };
        result.is_ok()
    }
}

/// Initialize logging from `MURMUR_LOG_FORMAT` and `MURMUR_LOG_LEVEL`
pub fn init_default() -> bool {
    LoggingConfig::from_env().init()
}
