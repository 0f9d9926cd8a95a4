//! Configuration loading, environment overrides and root folder resolution
//!
//! Tests that touch `READNING_*` variables are marked `#[serial]` so they
//! never observe each other's environment.

use readning_common::config::{
    load_config, load_toml_config, resolve_root_folder, write_toml_config, PipelineSettings,
    TomlConfig, ROOT_FOLDER_ENV,
};
use readning_common::Error;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};

#[test]
fn test_missing_sections_fall_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[pipeline]\nchunks_per_page = 2\n").unwrap();

    let config = load_toml_config(&path).unwrap();

    assert_eq!(config.pipeline.chunks_per_page, 2);
    assert_eq!(config.pipeline.max_chunk_size, 2000);
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.storage.database_file, "readning.db");
    assert!(config.root_folder.is_none());
}

#[test]
fn test_write_then_load_preserves_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sub").join("config.toml");

    let mut config = TomlConfig::default();
    config.root_folder = Some(PathBuf::from("/srv/readning"));
    config.pipeline.significance_threshold = 4;
    config.detector.model = "llama3".to_string();

    write_toml_config(&config, &path).unwrap();
    let loaded = load_toml_config(&path).unwrap();

    assert_eq!(loaded.root_folder, Some(PathBuf::from("/srv/readning")));
    assert_eq!(loaded.pipeline.significance_threshold, 4);
    assert_eq!(loaded.detector.model, "llama3");
    assert!(!path.with_extension("toml.tmp").exists());
}

#[test]
fn test_malformed_toml_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[pipeline\nchunks_per_page = ").unwrap();

    let result = load_toml_config(&path);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_env_override_replaces_file_value() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[pipeline]\nchunks_per_page = 2\n").unwrap();

    env::set_var("READNING_CHUNKS_PER_PAGE", "6");
    let config = load_config(Some(&path));
    env::remove_var("READNING_CHUNKS_PER_PAGE");

    assert_eq!(config.unwrap().pipeline.chunks_per_page, 6);
}

#[test]
#[serial]
fn test_unparseable_env_override_is_rejected() {
    let mut settings = PipelineSettings::default();

    env::set_var("READNING_MAX_CHUNK_SIZE", "lots");
    let result = settings.apply_env_overrides();
    env::remove_var("READNING_MAX_CHUNK_SIZE");

    assert!(matches!(result, Err(Error::Config(_))));
    assert_eq!(settings.max_chunk_size, 2000);
}

#[test]
#[serial]
fn test_invalid_combination_fails_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[pipeline]\nmin_chunk_size = 900\nmax_chunk_size = 1000\n",
    )
    .unwrap();

    let result = load_config(Some(&path));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_root_folder_priority() {
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    assert_eq!(
        resolve_root_folder(Some(Path::new("/from/cli")), &config),
        PathBuf::from("/from/cli")
    );
    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/from/env"));

    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/from/toml"));

    let fallback = resolve_root_folder(None, &TomlConfig::default());
    assert!(!fallback.as_os_str().is_empty());
}
