//! Coverage for config parsing, env overrides and environment resolution.

use std::path::PathBuf;

use plugboard::config::{load_config, load_config_with, Config, EnvironmentMode};
use plugboard::release::ExecutionEnvironment;

fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("write fixture");
    path
}

#[test]
fn parse_full_config() {
    let toml_str = r#"
[environment]
mode = "all-snap"
os_release = "/tmp/os-release"

[logging]
level = "debug"
logs_dir = "/var/log/plugboard"
"#;
    let config: Config = toml::from_str(toml_str).expect("config should parse");
    assert_eq!(config.environment.mode, EnvironmentMode::AllSnap);
    assert_eq!(config.environment.os_release, PathBuf::from("/tmp/os-release"));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(
        config.logging.logs_dir,
        Some(PathBuf::from("/var/log/plugboard"))
    );
}

#[test]
fn empty_config_uses_defaults() {
    let config: Config = toml::from_str("").expect("empty config should parse");
    assert_eq!(config.environment.mode, EnvironmentMode::Auto);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn unknown_mode_is_rejected() {
    let parsed = toml::from_str::<Config>("[environment]\nmode = \"sometimes\"\n");
    assert!(parsed.is_err());
}

#[test]
fn load_config_reports_missing_file() {
    let err = load_config(&PathBuf::from("/nonexistent/plugboard.toml"))
        .expect_err("missing file should fail");
    assert!(err.to_string().contains("failed to read config"));
}

#[test]
fn config_path_and_overrides_from_env() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let path = write(&dir, "plugboard.toml", "[logging]\nlevel = \"warn\"\n");
    let path_str = path.display().to_string();

    let config = load_config_with(|key| match key {
        "PLUGBOARD_CONFIG_PATH" => Some(path_str.clone()),
        "PLUGBOARD_ENVIRONMENT" => Some("classic".to_owned()),
        _ => None,
    })
    .expect("config should load");

    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.environment.mode, EnvironmentMode::Classic);
}

#[test]
fn log_level_override_wins_over_file() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let path = write(&dir, "plugboard.toml", "[logging]\nlevel = \"warn\"\n");
    let path_str = path.display().to_string();

    let config = load_config_with(|key| match key {
        "PLUGBOARD_CONFIG_PATH" => Some(path_str.clone()),
        "PLUGBOARD_LOG_LEVEL" => Some("trace".to_owned()),
        _ => None,
    })
    .expect("config should load");

    assert_eq!(config.logging.level, "trace");
}

#[test]
fn missing_config_file_yields_defaults() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let path_str = dir.path().join("absent.toml").display().to_string();

    let config = load_config_with(|key| (key == "PLUGBOARD_CONFIG_PATH").then(|| path_str.clone()))
        .expect("defaults");
    assert_eq!(config.environment.mode, EnvironmentMode::Auto);
}

#[test]
fn auto_mode_reads_os_release() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let core = write(&dir, "core-release", "NAME=\"Ubuntu Core\"\nID=ubuntu-core\n");
    let classic = write(&dir, "classic-release", "NAME=Fedora\nID=fedora\n");

    let mut config = Config::default();
    config.environment.os_release = core;
    assert_eq!(
        config.environment.resolve().expect("resolve"),
        ExecutionEnvironment::AllSnap
    );

    config.environment.os_release = classic;
    assert_eq!(
        config.environment.resolve().expect("resolve"),
        ExecutionEnvironment::Classic
    );

    config.environment.os_release = dir.path().join("missing");
    assert_eq!(
        config.environment.resolve().expect("resolve"),
        ExecutionEnvironment::Classic
    );
}
