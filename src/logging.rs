//! Logging capability injected into each pipeline.
//!
//! A `PipelineLogger` carries a component name and a level and is handed
//! to a processor at construction. Events go through `tracing`; the
//! process-wide sink is installed once by the binary via `init_subscriber`.

use crate::constants::LOG_TARGET;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Verbosity of a single pipeline's events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    /// Suppress every event from the pipeline
    None,
}

impl LogLevel {
    /// Parse a level name case-insensitively; unknown names fall back to `Info`
    pub fn parse_lenient(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => LogLevel::Debug,
            "NONE" => LogLevel::None,
            _ => LogLevel::Info,
        }
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::None => "off",
        }
    }
}

impl From<String> for LogLevel {
    fn from(value: String) -> Self {
        LogLevel::parse_lenient(&value)
    }
}

impl From<LogLevel> for String {
    fn from(value: LogLevel) -> Self {
        value.to_string()
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::None => "NONE",
        };
        f.write_str(name)
    }
}

/// Per-pipeline logger with its own level
#[derive(Debug, Clone)]
pub struct PipelineLogger {
    component: String,
    level: LogLevel,
}

impl PipelineLogger {
    pub fn new(component: impl Into<String>, level: LogLevel) -> Self {
        Self {
            component: component.into(),
            level,
        }
    }

    /// Logger that drops every event
    pub fn disabled(component: impl Into<String>) -> Self {
        Self::new(component, LogLevel::None)
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    fn enabled(&self) -> bool {
        self.level != LogLevel::None
    }

    pub fn debug(&self, message: impl fmt::Display) {
        if self.level == LogLevel::Debug {
            debug!(component = %self.component, "{}", message);
        }
    }

    pub fn info(&self, message: impl fmt::Display) {
        if self.enabled() {
            info!(component = %self.component, "{}", message);
        }
    }

    pub fn warn(&self, message: impl fmt::Display) {
        if self.enabled() {
            warn!(component = %self.component, "{}", message);
        }
    }
}

/// Install the process-wide subscriber used by the binary
///
/// `RUST_LOG` takes precedence over `level`. Returns quietly if a
/// subscriber is already installed.
pub fn init_subscriber(level: LogLevel, quiet: bool) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{}={}", LOG_TARGET, level.as_filter_directive()))
    });

    let result = if quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };

    if result.is_ok() {
        debug!("Logging initialized at level: {}", level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lenient() {
        assert_eq!(LogLevel::parse_lenient("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::parse_lenient("INFO"), LogLevel::Info);
        assert_eq!(LogLevel::parse_lenient("None"), LogLevel::None);
        assert_eq!(LogLevel::parse_lenient("verbose"), LogLevel::Info);
    }

    #[test]
    fn test_level_round_trips_through_string() {
        let name: String = LogLevel::Debug.into();
        assert_eq!(name, "DEBUG");
        assert_eq!(LogLevel::from(name), LogLevel::Debug);
    }

    #[test]
    fn test_disabled_logger() {
        let logger = PipelineLogger::disabled("FieldDataProcessor");
        assert_eq!(logger.level(), LogLevel::None);
        assert_eq!(logger.component(), "FieldDataProcessor");
        // Must not panic without a subscriber
        logger.info("ignored");
        logger.warn("ignored");
    }
}
