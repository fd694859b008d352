//! Configuration manager - main API for config operations

use crate::persistence::ConfigPersistence;
use crate::{Config, ConfigError, ConfigResult};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Prefix shared by every environment override
pub const ENV_PREFIX: &str = "BOOKSHELF";

/// Main configuration manager
pub struct ConfigManager {
    persistence: ConfigPersistence,
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Creates a new config manager using the default config directory
    ///
    /// - Linux: `~/.config/bookshelf/`
    /// - macOS: `~/Library/Application Support/bookshelf/`
    /// - Windows: `%APPDATA%\bookshelf\`
    pub fn new() -> ConfigResult<Self> {
        let config_dir = Self::default_config_dir()?;
        Self::with_directory(config_dir)
    }

    /// Creates a config manager with a custom config directory
    pub fn with_directory(config_dir: PathBuf) -> ConfigResult<Self> {
        let config_path = config_dir.join("config.toml");
        Ok(Self {
            persistence: ConfigPersistence::new(config_path),
            config_dir,
        })
    }

    /// Creates a config manager for an explicit config file, as given by `--config`
    pub fn with_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let config_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self {
            persistence: ConfigPersistence::new(path),
            config_dir,
        })
    }

    fn default_config_dir() -> ConfigResult<PathBuf> {
        ProjectDirs::from("", "", "bookshelf")
            .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
            .ok_or_else(|| ConfigError::PathResolutionError {
                reason: "Could not determine user config directory".to_string(),
            })
    }

    /// Returns the config directory path
    pub fn config_dir(&self) -> &PathBuf {
        &self.config_dir
    }

    /// Returns the full config file path
    pub fn config_path(&self) -> PathBuf {
        self.persistence.path().to_path_buf()
    }

    /// Loads the configuration from file
    pub fn load(&self) -> ConfigResult<Config> {
        self.persistence.load()
    }

    /// Loads the configuration, falling back to defaults on any error
    pub fn load_or_default(&self) -> Config {
        match self.load() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config: {}, using defaults", e);
                Config::default()
            }
        }
    }

    /// Saves the configuration to file
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        self.persistence.save(config)
    }

    /// Loads, applies `update_fn`, and saves the result
    pub fn update<F>(&self, update_fn: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config),
    {
        let mut config = self.load()?;
        update_fn(&mut config);
        self.save(&config)
    }

    /// Writes a default config file if one doesn't exist
    ///
    /// Returns Ok(true) if a new file was created.
    pub fn initialize(&self) -> ConfigResult<bool> {
        if self.config_path().exists() {
            log::info!(
                "Config file already exists at {}",
                self.config_path().display()
            );
            return Ok(false);
        }

        self.persistence.save(&Config::default())?;
        log::info!("Generated default config at {}", self.config_path().display());
        Ok(true)
    }

    /// Validates the current configuration file
    pub fn validate(&self) -> ConfigResult<Vec<String>> {
        let config = self.load()?;

        match config.validate() {
            Ok(()) => Ok(Vec::new()),
            Err(errors) => Ok(errors.iter().map(|e| e.to_string()).collect()),
        }
    }

    /// Loads the file and applies `BOOKSHELF_<SECTION>_<KEY>` overrides from the process environment
    pub fn load_with_env_overrides(&self) -> ConfigResult<Config> {
        let mut config = self.load()?;
        apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

        if let Err(errors) = config.validate() {
            log::warn!(
                "Config validation warnings after env overrides: {:?}",
                errors
            );
        }

        Ok(config)
    }
}

fn env_key(section: &str, field: &str) -> String {
    format!(
        "{}_{}_{}",
        ENV_PREFIX,
        section.to_ascii_uppercase(),
        field.to_ascii_uppercase()
    )
}

fn override_field<T, L>(lookup: &L, section: &str, field: &str, target: &mut T) -> ConfigResult<()>
where
    T: FromStr,
    L: Fn(&str) -> Option<String>,
{
    let key = env_key(section, field);
    if let Some(value) = lookup(&key) {
        *target = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidOverride {
                key: key.clone(),
                value: value.clone(),
            })?;
        log::debug!("Applied override {}", key);
    }
    Ok(())
}

/// Applies overrides read through `lookup`
///
/// Unset keys leave the field untouched. A value that does not parse for its field
/// is rejected with [`ConfigError::InvalidOverride`].
pub fn apply_env_overrides<L>(config: &mut Config, lookup: L) -> ConfigResult<()>
where
    L: Fn(&str) -> Option<String>,
{
    let app = &mut config.app;
    override_field(&lookup, "app", "log_level", &mut app.log_level)?;
    override_field(&lookup, "app", "debug_mode", &mut app.debug_mode)?;

    let server = &mut config.server;
    override_field(&lookup, "server", "address", &mut server.address)?;
    override_field(&lookup, "server", "permissive_cors", &mut server.permissive_cors)?;
    override_field(&lookup, "server", "default_search_limit", &mut server.default_search_limit)?;
    override_field(&lookup, "server", "default_recent_limit", &mut server.default_recent_limit)?;

    let search = &mut config.search;
    override_field(&lookup, "search", "backend", &mut search.backend)?;
    override_field(&lookup, "search", "host", &mut search.host)?;
    override_field(&lookup, "search", "index", &mut search.index)?;
    override_field(&lookup, "search", "staging_suffix", &mut search.staging_suffix)?;
    if let Some(key) = lookup(&env_key("search", "api_key")) {
        search.api_key = if key.is_empty() { None } else { Some(key) };
    }

    let source = &mut config.source;
    override_field(&lookup, "source", "kind", &mut source.kind)?;
    override_field(&lookup, "source", "server", &mut source.server)?;
    override_field(&lookup, "source", "library", &mut source.library)?;
    override_field(&lookup, "source", "library_db_path", &mut source.library_db_path)?;

    let reindex = &mut config.reindex;
    override_field(&lookup, "reindex", "batch_size", &mut reindex.batch_size)?;
    override_field(&lookup, "reindex", "write_batch_size", &mut reindex.write_batch_size)?;
    override_field(&lookup, "reindex", "task_deadline_secs", &mut reindex.task_deadline_secs)?;
    override_field(&lookup, "reindex", "poll_interval_secs", &mut reindex.poll_interval_secs)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LogLevel, SearchBackend, SourceKind};
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn setup_test_manager() -> (TempDir, ConfigManager) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let manager = ConfigManager::with_directory(temp_dir.path().to_path_buf())
            .expect("Failed to create manager");
        (temp_dir, manager)
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_load_or_default_with_missing_file() {
        let (_temp_dir, manager) = setup_test_manager();
        assert_eq!(manager.load_or_default(), Config::default());
    }

    #[test]
    fn test_update() {
        let (_temp_dir, manager) = setup_test_manager();
        manager.save(&Config::default()).expect("Should save");

        manager
            .update(|config| config.search.index = "books".to_string())
            .expect("Should update");

        let loaded = manager.load().expect("Should load");
        assert_eq!(loaded.search.index, "books");
    }

    #[test]
    fn test_initialize_only_once() {
        let (_temp_dir, manager) = setup_test_manager();
        assert!(manager.initialize().expect("Should initialize"));
        assert!(manager.config_path().exists());
        assert!(!manager.initialize().expect("Should initialize"));
    }

    #[test]
    fn test_with_file_uses_given_path() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("custom.toml");
        let manager = ConfigManager::with_file(&path).expect("Should create manager");

        manager.save(&Config::default()).expect("Should save");
        assert!(path.exists());
        assert_eq!(manager.config_dir(), &temp_dir.path().to_path_buf());
    }

    #[test]
    fn test_env_overrides_apply() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("BOOKSHELF_APP_LOG_LEVEL", "debug"),
                ("BOOKSHELF_SERVER_ADDRESS", ":9090"),
                ("BOOKSHELF_SEARCH_BACKEND", "memory"),
                ("BOOKSHELF_SEARCH_API_KEY", "secret"),
                ("BOOKSHELF_SOURCE_KIND", "library_db"),
                ("BOOKSHELF_REINDEX_BATCH_SIZE", " 500 "),
                ("BOOKSHELF_REINDEX_TASK_DEADLINE_SECS", "60"),
            ]),
        )
        .expect("Should apply overrides");

        assert_eq!(config.app.log_level, LogLevel::Debug);
        assert_eq!(config.server.address, ":9090");
        assert_eq!(config.search.backend, SearchBackend::Memory);
        assert_eq!(config.search.api_key.as_deref(), Some("secret"));
        assert_eq!(config.source.kind, SourceKind::LibraryDb);
        assert_eq!(config.reindex.batch_size, 500);
        assert_eq!(config.reindex.task_deadline_secs, 60);
        assert_eq!(config.reindex.poll_interval_secs, 3);
    }

    #[test]
    fn test_env_override_parse_failure() {
        let mut config = Config::default();
        let err = apply_env_overrides(&mut config, env(&[("BOOKSHELF_REINDEX_BATCH_SIZE", "lots")]))
            .unwrap_err();

        match err {
            ConfigError::InvalidOverride { key, value } => {
                assert_eq!(key, "BOOKSHELF_REINDEX_BATCH_SIZE");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(config.reindex.batch_size, 2000);
    }

    #[test]
    fn test_empty_api_key_clears_it() {
        let mut config = Config::default();
        config.search.api_key = Some("old".to_string());
        apply_env_overrides(&mut config, env(&[("BOOKSHELF_SEARCH_API_KEY", "")]))
            .expect("Should apply overrides");
        assert!(config.search.api_key.is_none());
    }

    #[test]
    fn test_config_file_path() {
        let (_temp_dir, manager) = setup_test_manager();
        assert!(manager.config_path().ends_with("config.toml"));
    }
}
