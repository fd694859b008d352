//! Bookshelf Configuration System
//!
//! Every tunable of the reindex service lives in one TOML file, split into
//! sections that each implement [`ConfigSection`].
//!
//! Precedence is defaults < file < `BOOKSHELF_<SECTION>_<KEY>` environment
//! variables < command-line flags (applied by the binary).
//!
//! # Example
//!
//! ```rust,no_run
//! use bookshelf_config::{Config, ConfigManager};
//!
//! let manager = ConfigManager::new().expect("Failed to initialize config");
//! let config = manager.load().unwrap_or_else(|e| {
//!     eprintln!("Config error: {}, using defaults", e);
//!     Config::default()
//! });
//!
//! println!("Staging index: {}", config.search.staging_index());
//! ```

mod error;
mod manager;
mod persistence;
mod validation;

// Config sections
pub mod app_config;
mod reindex_config;
mod search_config;
mod server_config;
mod source_config;

pub use error::{ConfigError, ConfigResult, ValidationError};
pub use manager::{apply_env_overrides, ConfigManager, ENV_PREFIX};
pub use validation::{ConfigSection, Validator};

pub use app_config::{AppConfig, LogLevel};
pub use reindex_config::ReindexConfig;
pub use search_config::{SearchBackend, SearchConfig};
pub use server_config::ServerConfig;
pub use source_config::{SourceConfig, SourceKind};

use serde::{Deserialize, Serialize};

/// Current config file format version
pub const CONFIG_VERSION: u32 = 1;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Config file format version
    pub version: u32,

    /// Application-level settings
    pub app: AppConfig,

    /// HTTP surface
    pub server: ServerConfig,

    /// Search engine connection and index names
    pub search: SearchConfig,

    /// Authoritative metadata source
    pub source: SourceConfig,

    /// Reindex run tuning
    pub reindex: ReindexConfig,
}

impl Config {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the entire configuration
    ///
    /// Returns all validation errors found across all sections.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for result in [
            self.app.validate(),
            self.server.validate(),
            self.search.validate(),
            self.source.validate(),
            self.reindex.validate(),
        ] {
            if let Err(mut e) = result {
                errors.append(&mut e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validates and joins any errors into a single message
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.validate().map_err(|errors| {
            ConfigError::ValidationError(
                errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })
    }

    /// Merges this config with another, preferring values from `other`
    pub fn merge(&mut self, other: Config) {
        self.app.merge(other.app);
        self.server.merge(other.server);
        self.search.merge(other.search);
        self.source.merge(other.source);
        self.reindex.merge(other.reindex);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            app: AppConfig::default(),
            server: ServerConfig::default(),
            search: SearchConfig::default(),
            source: SourceConfig::default(),
            reindex: ReindexConfig::default(),
        }
    }
}
