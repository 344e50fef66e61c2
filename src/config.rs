use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::notify::Permission;
use crate::query::{SortBy, SortOrder};
use crate::utils;

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Whether reminders may be shown. Starts as "default" (never asked).
    #[serde(default)]
    pub notifications: Permission,
    #[serde(default)]
    pub default_sort: SortBy,
    /// Falls back to the sort key's own direction when unset
    #[serde(default)]
    pub default_order: Option<SortOrder>,
    #[serde(default = "default_upcoming_window_days")]
    pub upcoming_window_days: i64,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            log_level: default_log_level(),
            notifications: Permission::Default,
            default_sort: SortBy::Due,
            default_order: None,
            upcoming_window_days: default_upcoming_window_days(),
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

// Default value functions
fn default_database_path() -> String {
    // This is a fallback - actual profile will be determined at load time
    Config::default_database_path_for_profile(utils::Profile::Prod)
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_upcoming_window_days() -> i64 {
    3
}

fn default_config_version() -> Option<u32> {
    Some(CURRENT_CONFIG_VERSION)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config directory: {0}")]
    ConfigDirError(String),
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
}

impl Config {
    /// Load configuration from an explicit path, creating it with defaults if missing
    pub fn load_from_path(config_path: &Path, profile: utils::Profile) -> Result<Self, ConfigError> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path)
                .map_err(|e| ConfigError::ReadError(e.to_string()))?;
            let mut config: Config = toml::from_str(&contents)?;
            if config.database_path.trim().is_empty() {
                config.database_path = Self::default_database_path_for_profile(profile);
            }
            Ok(config)
        } else {
            let mut config = Config::default();
            config.database_path = Self::default_database_path_for_profile(profile);
            let save_result = config.save_to_path(config_path);
            if let Err(ref e) = save_result {
                tracing::error!(path = %config_path.display(), error = %e, "failed to save config file");
            }
            save_result?;
            Ok(config)
        }
    }

    /// Save configuration to an explicit path
    pub fn save_to_path(&mut self, config_path: &Path) -> Result<(), ConfigError> {
        // Ensure config version is set before saving
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(config_path, toml_string)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(profile)
            .ok_or_else(|| ConfigError::ConfigDirError("Could not determine config directory".to_string()))?;
        Ok(config_dir.join("config.toml"))
    }

    /// Get default database path for a specific profile
    fn default_database_path_for_profile(profile: utils::Profile) -> String {
        if let Some(data_dir) = utils::get_data_dir(profile) {
            data_dir.join("studytrack.db").to_string_lossy().to_string()
        } else {
            match profile {
                utils::Profile::Dev => "~/.local/share/studytrack-dev/studytrack.db".to_string(),
                utils::Profile::Prod => "~/.local/share/studytrack/studytrack.db".to_string(),
            }
        }
    }

    /// Get the expanded database path (with ~ expansion)
    pub fn get_database_path(&self) -> PathBuf {
        utils::expand_path(&self.database_path)
    }

    /// Sort order to use when the caller didn't ask for one
    pub fn sort_order_for(&self, sort_by: SortBy) -> SortOrder {
        self.default_order.unwrap_or_else(|| sort_by.default_order())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from_path(&path, utils::Profile::Dev).unwrap();
        assert!(path.exists());
        assert_eq!(config.notifications, Permission::Default);
        assert_eq!(config.upcoming_window_days, 3);
        assert_eq!(config.config_version, Some(CURRENT_CONFIG_VERSION));
        assert!(config.database_path.contains("studytrack"));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "notifications = \"granted\"\ndefault_sort = \"created\"\n").unwrap();

        let config = Config::load_from_path(&path, utils::Profile::Prod).unwrap();
        assert_eq!(config.notifications, Permission::Granted);
        assert_eq!(config.default_sort, SortBy::Created);
        assert_eq!(config.sort_order_for(SortBy::Created), SortOrder::Desc);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn saved_changes_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::load_from_path(&path, utils::Profile::Dev).unwrap();

        config.notifications = Permission::Denied;
        config.default_order = Some(SortOrder::Desc);
        config.save_to_path(&path).unwrap();

        let reloaded = Config::load_from_path(&path, utils::Profile::Dev).unwrap();
        assert_eq!(reloaded.notifications, Permission::Denied);
        assert_eq!(reloaded.sort_order_for(SortBy::Due), SortOrder::Desc);
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "upcoming_window_days = \"three\"").unwrap();
        assert!(matches!(
            Config::load_from_path(&path, utils::Profile::Dev),
            Err(ConfigError::ParseError(_))
        ));
    }
}
