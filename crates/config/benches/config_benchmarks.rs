//! Benchmarks for configuration system
//!
//! Run with: cargo bench --package bookshelf-config

use bookshelf_config::{apply_env_overrides, Config, ConfigManager};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use tempfile::TempDir;

fn bench_config_validation(c: &mut Criterion) {
    let config = Config::default();

    c.bench_function("config_validate", |b| {
        b.iter(|| black_box(config.validate()));
    });
}

fn bench_config_deserialization(c: &mut Criterion) {
    let toml_string = toml::to_string(&Config::default()).expect("Failed to serialize");

    c.bench_function("config_deserialize_toml", |b| {
        b.iter(|| {
            let config: Config = toml::from_str(&toml_string).expect("Failed to deserialize");
            black_box(config);
        });
    });
}

fn bench_config_load(c: &mut Criterion) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let manager = ConfigManager::with_directory(temp_dir.path().to_path_buf())
        .expect("Failed to create manager");
    manager.initialize().expect("Failed to initialize");

    c.bench_function("config_load", |b| {
        b.iter(|| black_box(manager.load().expect("Failed to load")));
    });
}

fn bench_env_overrides(c: &mut Criterion) {
    let lookup = |key: &str| match key {
        "BOOKSHELF_REINDEX_BATCH_SIZE" => Some("500".to_string()),
        "BOOKSHELF_SEARCH_INDEX" => Some("books".to_string()),
        _ => None,
    };

    c.bench_function("config_env_overrides", |b| {
        b.iter(|| {
            let mut config = Config::default();
            apply_env_overrides(&mut config, lookup).expect("Failed to apply");
            black_box(config);
        });
    });
}

criterion_group!(
    benches,
    bench_config_validation,
    bench_config_deserialization,
    bench_config_load,
    bench_env_overrides
);

criterion_main!(benches);
