//! Application-level configuration section

use crate::validation::{ConfigSection, ValidationError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Log level for application logging
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Application-level settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Default filter for the logger, `RUST_LOG` still wins
    pub log_level: LogLevel,

    /// Enable debug mode (verbose request logging)
    pub debug_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            debug_mode: false,
        }
    }
}

impl AppConfig {
    /// The effective log filter, raised to `debug` in debug mode
    pub fn effective_log_level(&self) -> LogLevel {
        if self.debug_mode && matches!(self.log_level, LogLevel::Error | LogLevel::Warn | LogLevel::Info) {
            LogLevel::Debug
        } else {
            self.log_level
        }
    }
}

impl ConfigSection for AppConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Ok(())
    }

    fn merge(&mut self, other: Self) {
        self.log_level = other.log_level;
        self.debug_mode = other.debug_mode;
    }

    fn section_name(&self) -> &'static str {
        "app"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_log_level_parse_and_display() {
        assert_eq!("WARNING".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!(LogLevel::Trace.to_string(), "trace");
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_debug_mode_raises_level() {
        let config = AppConfig {
            log_level: LogLevel::Info,
            debug_mode: true,
        };
        assert_eq!(config.effective_log_level(), LogLevel::Debug);

        let trace = AppConfig {
            log_level: LogLevel::Trace,
            debug_mode: true,
        };
        assert_eq!(trace.effective_log_level(), LogLevel::Trace);
    }

    #[test]
    fn test_merge() {
        let mut base = AppConfig::default();
        base.merge(AppConfig {
            log_level: LogLevel::Debug,
            debug_mode: true,
        });
        assert_eq!(base.log_level, LogLevel::Debug);
        assert!(base.debug_mode);
    }
}
