//! Integration tests for the configuration system

use bookshelf_config::{
    apply_env_overrides, AppConfig, Config, ConfigManager, ConfigSection, ReindexConfig,
    SearchConfig, ServerConfig, SourceConfig, SourceKind, CONFIG_VERSION,
};
use tempfile::TempDir;

fn setup_test_manager() -> Result<(TempDir, ConfigManager), Box<dyn std::error::Error>> {
    let _ = env_logger::builder().is_test(true).try_init();
    let temp_dir = TempDir::new()?;
    let manager = ConfigManager::with_directory(temp_dir.path().to_path_buf())?;
    Ok((temp_dir, manager))
}

#[test]
fn test_full_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;

    assert!(manager.initialize()?);

    let config = manager.load()?;
    assert_eq!(config.version, CONFIG_VERSION);

    let mut modified = config.clone();
    modified.search.index = "books".to_string();
    modified.source.kind = SourceKind::LibraryDb;
    modified.source.library_db_path = "/srv/calibre/metadata.db".into();
    manager.save(&modified)?;

    let reloaded = manager.load()?;
    assert_eq!(reloaded.search.staging_index(), "books-bak");
    assert_eq!(reloaded.source.kind, SourceKind::LibraryDb);

    Ok(())
}

#[test]
fn test_config_validation_integration() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;

    manager.save(&Config::default())?;
    assert!(manager.validate()?.is_empty());

    let mut invalid = Config::default();
    invalid.reindex.write_batch_size = 0;
    assert!(manager.save(&invalid).is_err());

    Ok(())
}

#[test]
fn test_all_sections_default_are_valid() {
    assert!(AppConfig::default().validate().is_ok());
    assert!(ServerConfig::default().validate().is_ok());
    assert!(SearchConfig::default().validate().is_ok());
    assert!(SourceConfig::default().validate().is_ok());
    assert!(ReindexConfig::default().validate().is_ok());
    assert!(Config::default().validate().is_ok());
}

#[test]
fn test_serialization_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
    let original = Config::default();
    let toml_string = toml::to_string(&original)?;
    let deserialized: Config = toml::from_str(&toml_string)?;
    assert_eq!(original, deserialized);
    Ok(())
}

#[test]
fn test_file_then_env_precedence() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;

    manager.update(|config| {
        config.reindex.batch_size = 300;
        config.search.host = "http://search.internal:7700".to_string();
    })?;

    let mut config = manager.load()?;
    apply_env_overrides(&mut config, |key| {
        (key == "BOOKSHELF_REINDEX_BATCH_SIZE").then(|| "400".to_string())
    })?;

    assert_eq!(config.reindex.batch_size, 400);
    assert_eq!(config.search.host, "http://search.internal:7700");

    Ok(())
}

#[test]
fn test_load_with_env_overrides_without_variables() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    manager.initialize()?;

    let config = manager.load_with_env_overrides()?;
    assert_eq!(config.search.index, "library");

    Ok(())
}
