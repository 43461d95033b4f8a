//! Unit tests for configuration loading and root folder resolution
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate TERMAP_ROOT_FOLDER are marked with #[serial].

use serial_test::serial;
use std::env;
use std::path::PathBuf;
use termap_common::config::{
    database_path, load_toml_config, resolve_root_folder, CliOverrides, ServiceConfig,
    TomlConfig, DATABASE_FILE_NAME, DEFAULT_HOST, DEFAULT_PORT, ROOT_FOLDER_ENV,
};
use termap_common::DuplicatePolicy;

#[test]
#[serial]
fn test_cli_argument_has_highest_priority() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/from-env");
    let toml_config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..Default::default()
    };

    let root = resolve_root_folder(Some("/tmp/from-cli"), ROOT_FOLDER_ENV, &toml_config);
    assert_eq!(root, PathBuf::from("/tmp/from-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/from-env");
    let toml_config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..Default::default()
    };

    let root = resolve_root_folder(None, ROOT_FOLDER_ENV, &toml_config);
    assert_eq!(root, PathBuf::from("/tmp/from-env"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_toml_used_when_no_cli_or_env() {
    env::remove_var(ROOT_FOLDER_ENV);
    let toml_config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..Default::default()
    };

    let root = resolve_root_folder(None, ROOT_FOLDER_ENV, &toml_config);
    assert_eq!(root, PathBuf::from("/tmp/from-toml"));
}

#[test]
#[serial]
fn test_default_root_folder_when_nothing_configured() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root = resolve_root_folder(None, ROOT_FOLDER_ENV, &TomlConfig::default());
    assert!(!root.as_os_str().is_empty());
    assert!(root.to_string_lossy().contains("termap"));
}

#[test]
fn test_database_path_is_fixed_name_in_root() {
    let path = database_path(&PathBuf::from("/srv/termap"));
    assert_eq!(path, PathBuf::from("/srv/termap").join(DATABASE_FILE_NAME));
}

#[test]
fn test_toml_parses_all_keys() {
    let config = TomlConfig::from_toml_str(
        r#"
        root_folder = "/data/termap"
        host = "0.0.0.0"
        port = 8080

        [storage]
        duplicate_codes = "reject"
        duplicate_mappings = "allow"
        max_connections = 2
        "#,
    )
    .unwrap();

    assert_eq!(config.root_folder, Some(PathBuf::from("/data/termap")));
    assert_eq!(config.host.as_deref(), Some("0.0.0.0"));
    assert_eq!(config.port, Some(8080));
    assert_eq!(config.storage.duplicate_codes, DuplicatePolicy::Reject);
    assert_eq!(config.storage.duplicate_mappings, DuplicatePolicy::Allow);
    assert_eq!(config.storage.max_connections, 2);
}

#[test]
fn test_empty_toml_gives_defaults() {
    let config = TomlConfig::from_toml_str("").unwrap();
    assert_eq!(config, TomlConfig::default());
    assert_eq!(config.storage.duplicate_codes, DuplicatePolicy::Allow);
}

#[test]
fn test_toml_rejects_unknown_policy() {
    let result = TomlConfig::from_toml_str("[storage]\nduplicate_codes = \"merge\"\n");
    assert!(result.is_err());
}

#[test]
fn test_explicit_missing_config_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_toml_config(Some(&dir.path().join("missing.toml")));
    assert!(result.is_err());
}

#[test]
fn test_explicit_config_file_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("termap.toml");
    std::fs::write(&path, "port = 9999\n").unwrap();

    let config = load_toml_config(Some(&path)).unwrap();
    assert_eq!(config.port, Some(9999));
}

#[test]
fn test_duplicate_policy_from_str() {
    assert_eq!("allow".parse::<DuplicatePolicy>(), Ok(DuplicatePolicy::Allow));
    assert_eq!("REJECT".parse::<DuplicatePolicy>(), Ok(DuplicatePolicy::Reject));
    assert!("skip".parse::<DuplicatePolicy>().is_err());
    assert_eq!(DuplicatePolicy::Reject.to_string(), "reject");
}

#[test]
#[serial]
fn test_service_config_merges_cli_over_toml() {
    env::remove_var(ROOT_FOLDER_ENV);
    let toml_config = TomlConfig {
        host: Some("0.0.0.0".to_string()),
        port: Some(8000),
        ..Default::default()
    };
    let cli = CliOverrides {
        root_folder: Some("/tmp/termap-cli".to_string()),
        port: Some(9000),
        duplicate_codes: Some(DuplicatePolicy::Reject),
        ..Default::default()
    };

    let config = ServiceConfig::resolve(&cli, &toml_config);
    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.port, 9000);
    assert_eq!(config.duplicate_codes, DuplicatePolicy::Reject);
    assert_eq!(config.duplicate_mappings, DuplicatePolicy::Allow);
    assert_eq!(config.bind_address(), "0.0.0.0:9000");
    assert_eq!(
        config.database_path(),
        PathBuf::from("/tmp/termap-cli").join(DATABASE_FILE_NAME)
    );
}

#[test]
#[serial]
fn test_service_config_defaults() {
    env::remove_var(ROOT_FOLDER_ENV);
    let config = ServiceConfig::resolve(&CliOverrides::default(), &TomlConfig::default());
    assert_eq!(config.host, DEFAULT_HOST);
    assert_eq!(config.port, DEFAULT_PORT);
    assert!(config.max_connections >= 1);
}
