//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the directory endpoint, page size, pagination seed and the
//! optional status endpoint.
//!
//! Configuration is stored at `~/.config/matchcache/config.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "matchcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default remote directory
pub const DEFAULT_API_BASE_URL: &str = "https://randomuser.me/api";

/// Profiles requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 10;

const DEFAULT_SEED: &str = "matchcache";

/// Cached profile store file name
pub const PROFILES_FILE: &str = "profiles.json";

/// Pending offline decisions file name
pub const PENDING_ACTIONS_FILE: &str = "pending_actions.json";

/// Avatar image directory name
pub const IMAGES_DIR: &str = "images";

/// Log file directory name
pub const LOGS_DIR: &str = "logs";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub page_size: u32,
    pub seed: String,
    pub status_url: Option<String>,
    pub offline: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            seed: DEFAULT_SEED.to_string(),
            status_url: None,
            offline: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            Ok(config.normalized())
        } else {
            Ok(Self::default())
        }
    }

    /// A zero page size would never terminate pagination.
    fn normalized(mut self) -> Self {
        if self.page_size == 0 {
            self.page_size = DEFAULT_PAGE_SIZE;
        }
        self
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert!(!config.offline);
    }

    #[test]
    fn test_load_full_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = Config {
            page_size: 25,
            status_url: Some("https://status.example.com".to_string()),
            offline: true,
            ..Config::default()
        };
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.page_size, 25);
        assert_eq!(loaded.status_url.as_deref(), Some("https://status.example.com"));
        assert!(loaded.offline);
    }

    #[test]
    fn test_partial_file_fills_defaults_and_fixes_zero_page_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"page_size": 0, "offline": true}"#).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(loaded.seed, DEFAULT_SEED);
        assert!(loaded.offline);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
