use dupecat::config::{Config, ConfigOverrides, ScanOverrides};
use dupecat::error::Error;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_file_values_reach_every_section() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
database = "/srv/catalog.db"

[scan]
follow_symlinks = true
max_depth = 12
exclude_patterns = ["node_modules", "*.part"]
insert_batch_size = 250

[hashing]
full_max_size = 4096
sample_max_size = 65536
sample_count = 6

[migration]
batch_size = 50
max_consecutive_failures = 5
"#,
    );

    let config = Config::load(Some(&path), &ConfigOverrides::default()).unwrap();

    assert_eq!(config.database, PathBuf::from("/srv/catalog.db"));
    assert!(config.scan.follow_symlinks);
    assert_eq!(config.scan.max_depth, Some(12));
    assert_eq!(config.scan.exclude_patterns, vec!["node_modules", "*.part"]);
    assert_eq!(config.scan.insert_batch_size, 250);
    assert_eq!(config.hashing.full_max_size, 4096);
    assert_eq!(config.hashing.sample_count, 6);
    assert_eq!(config.migration.batch_size, 50);
    assert_eq!(config.migration.max_consecutive_failures, 5);
}

#[test]
fn test_env_layer_nests_with_double_underscore() {
    // Scoped to a private prefix so parallel tests never see it.
    std::env::set_var("DUPECAT_TEST_ENV_SCAN__MAX_DEPTH", "7");
    std::env::set_var("DUPECAT_TEST_ENV_HASHING__SAMPLE_COUNT", "3");

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Env::prefixed("DUPECAT_TEST_ENV_").split("__"))
        .extract()
        .unwrap();

    assert_eq!(config.scan.max_depth, Some(7));
    assert_eq!(config.hashing.sample_count, 3);
    assert_eq!(config.migration.batch_size, 1000);

    std::env::remove_var("DUPECAT_TEST_ENV_SCAN__MAX_DEPTH");
    std::env::remove_var("DUPECAT_TEST_ENV_HASHING__SAMPLE_COUNT");
}

#[test]
fn test_env_beats_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[migration]\nbatch_size = 10\n");
    std::env::set_var("DUPECAT_TEST_ORDER_MIGRATION__BATCH_SIZE", "20");

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("DUPECAT_TEST_ORDER_").split("__"))
        .extract()
        .unwrap();

    assert_eq!(config.migration.batch_size, 20);
    std::env::remove_var("DUPECAT_TEST_ORDER_MIGRATION__BATCH_SIZE");
}

#[test]
fn test_cli_overrides_beat_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "[scan]\nexclude_patterns = [\"a\"]\nmax_depth = 2\n",
    );
    let overrides = ConfigOverrides {
        database: None,
        scan: ScanOverrides {
            exclude_patterns: Some(vec!["b".to_string()]),
            ..Default::default()
        },
    };

    let config = Config::load(Some(&path), &overrides).unwrap();

    assert_eq!(config.scan.exclude_patterns, vec!["b"]);
    assert_eq!(config.scan.max_depth, Some(2));
}

#[test]
fn test_inconsistent_hash_bounds_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "[hashing]\nfull_max_size = 100\nsample_max_size = 10\n",
    );

    let err = Config::load(Some(&path), &ConfigOverrides::default()).unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert!(err.is_systemic());
}

#[test]
fn test_zero_batch_size_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[migration]\nbatch_size = 0\n");

    let err = Config::load(Some(&path), &ConfigOverrides::default()).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_wrong_type_is_load_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[scan]\nmax_depth = \"deep\"\n");

    let err = Config::load(Some(&path), &ConfigOverrides::default()).unwrap_err();
    assert!(matches!(err, Error::ConfigLoad(_)));
}

#[test]
fn test_rendered_toml_loads_back() {
    let dir = TempDir::new().unwrap();
    let mut original = Config::default();
    original.scan.exclude_patterns = vec![".git".to_string()];
    original.hashing.sample_count = 12;
    let path = write_config(&dir, &original.to_toml().unwrap());

    let loaded = Config::load(Some(&path), &ConfigOverrides::default()).unwrap();

    assert_eq!(loaded.scan.exclude_patterns, original.scan.exclude_patterns);
    assert_eq!(loaded.hashing, original.hashing);
}
