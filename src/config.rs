//! Configuration loading.
//!
//! `plugboard.toml` is optional; every section has defaults. Environment
//! variables override file values:
//! - `PLUGBOARD_CONFIG_PATH`: config file location
//! - `PLUGBOARD_ENVIRONMENT`: `auto`, `classic` or `all-snap`
//! - `PLUGBOARD_LOG_LEVEL`: tracing filter used when `RUST_LOG` is unset

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::release::{ExecutionEnvironment, OS_RELEASE_PATH};

/// Config file name inside [`config_dir`].
pub const CONFIG_FILE: &str = "plugboard.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// How the execution environment is determined.
    #[serde(default)]
    pub environment: EnvironmentConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How to pick the execution environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvironmentMode {
    /// Detect from os-release.
    #[default]
    Auto,
    /// Force classic.
    Classic,
    /// Force fully sandboxed.
    AllSnap,
}

impl std::str::FromStr for EnvironmentMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "classic" => Ok(Self::Classic),
            "all-snap" => Ok(Self::AllSnap),
            other => Err(anyhow::anyhow!(
                "unknown environment mode {other:?} (expected auto, classic or all-snap)"
            )),
        }
    }
}

/// Execution environment settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentConfig {
    /// Detection mode.
    #[serde(default)]
    pub mode: EnvironmentMode,

    /// os-release file consulted in `auto` mode.
    #[serde(default = "default_os_release")]
    pub os_release: PathBuf,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            mode: EnvironmentMode::default(),
            os_release: default_os_release(),
        }
    }
}

impl EnvironmentConfig {
    /// Resolve the configured mode to a concrete environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `auto` mode cannot read the os-release file.
    pub fn resolve(&self) -> anyhow::Result<ExecutionEnvironment> {
        match self.mode {
            EnvironmentMode::Classic => Ok(ExecutionEnvironment::Classic),
            EnvironmentMode::AllSnap => Ok(ExecutionEnvironment::AllSnap),
            EnvironmentMode::Auto => ExecutionEnvironment::detect(&self.os_release)
                .with_context(|| format!("failed to read {}", self.os_release.display())),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for JSON log files; console only when unset.
    #[serde(default)]
    pub logs_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            logs_dir: None,
        }
    }
}

// Default value functions for serde

fn default_os_release() -> PathBuf {
    PathBuf::from(OS_RELEASE_PATH)
}
fn default_log_level() -> String {
    "info".to_owned()
}

impl Config {
    /// Apply environment variable overrides.
    ///
    /// Takes a resolver so tests need not touch the process environment.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("PLUGBOARD_ENVIRONMENT") {
            match v.parse() {
                Ok(mode) => self.environment.mode = mode,
                Err(e) => tracing::warn!(
                    var = "PLUGBOARD_ENVIRONMENT",
                    value = %v,
                    error = %e,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("PLUGBOARD_LOG_LEVEL") {
            self.logging.level = v;
        }
    }
}

/// Load the config from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config at {}: {e}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config at {}: {e}", path.display()))?;
    Ok(config)
}

/// Load the config from its default location with env overrides.
///
/// A missing file yields defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed, or
/// the home directory cannot be determined.
pub fn load_default_config() -> anyhow::Result<Config> {
    load_config_with(|key| std::env::var(key).ok())
}

/// [`load_default_config`] with a custom env resolver.
///
/// # Errors
///
/// See [`load_default_config`].
pub fn load_config_with(env: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
    let path = match env("PLUGBOARD_CONFIG_PATH") {
        Some(p) => PathBuf::from(p),
        None => config_dir()?.join(CONFIG_FILE),
    };
    let mut config = if path.exists() {
        tracing::debug!(path = %path.display(), "loading config from file");
        load_config(&path)?
    } else {
        tracing::debug!(path = %path.display(), "no config file found, using defaults");
        Config::default()
    };
    config.apply_overrides(env);
    Ok(config)
}

/// Resolve the default config directory (`~/.plugboard/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".plugboard"))
}
