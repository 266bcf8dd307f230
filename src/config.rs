// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Configuration management
//!
//! Built-in defaults, then the TOML file, then `MODELYARD_*` variables.

use crate::import::NATIVE_IMPORT_TYPE;
use crate::persistence::DEFAULT_RECENT_LIMIT;
use anyhow::{Context, Result};
use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "MODELYARD";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the local project collections
    pub data_dir: PathBuf,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Page size for recent-project listings
    pub recent_page_size: usize,
    /// Import type used when none is given
    pub import_type: String,
    /// Quiet window before a zoom change is announced, in milliseconds
    pub zoom_debounce_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: project_dirs()
                .map(|d| d.data_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from("~/.local/share/modelyard")),
            log_level: "info".to_string(),
            recent_page_size: DEFAULT_RECENT_LIMIT,
            import_type: NATIVE_IMPORT_TYPE.to_string(),
            zoom_debounce_ms: 10,
        }
    }
}

impl Config {
    /// Parsed `log_level`
    pub fn max_level(&self) -> Result<tracing::Level> {
        self.log_level
            .parse()
            .with_context(|| format!("Invalid log_level: {}", self.log_level))
    }

    /// Zoom debounce window
    #[must_use]
    pub fn zoom_debounce(&self) -> Duration {
        Duration::from_millis(self.zoom_debounce_ms)
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "hyperpolymath", "modelyard")
}

/// Default location of the configuration file
#[must_use]
pub fn default_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join("config.toml"))
}

/// Load configuration from `path` (or the default location) and the environment
pub fn load(path: Option<&Path>) -> Result<Config> {
    let defaults = config::Config::try_from(&Config::default())
        .context("Failed to build default configuration")?;
    let mut builder = config::Config::builder().add_source(defaults);

    match path {
        Some(path) => {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        None => {
            if let Some(path) = default_path() {
                builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
            }
        }
    }

    builder
        .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "recent_page_size = 5\nimport_type = \"ld+graph\"\n").unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.recent_page_size, 5);
        assert_eq!(config.zoom_debounce_ms, 10);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_log_level_parses() {
        assert_eq!(Config::default().max_level().unwrap(), tracing::Level::INFO);

        let config = Config {
            log_level: "debug".into(),
            ..Config::default()
        };
        assert_eq!(config.max_level().unwrap(), tracing::Level::DEBUG);

        let config = Config {
            log_level: "chatty".into(),
            ..Config::default()
        };
        assert!(config.max_level().is_err());
    }

    #[test]
    fn test_config_serializes_to_toml() {
        let text = toml::to_string(&Config::default()).unwrap();
        assert!(text.contains("recent_page_size = 25"));
    }
}
