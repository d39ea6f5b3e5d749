//! Application configuration management.
//!
//! Startup configuration for the cache controller (generation name, app-shell
//! manifest, root document, tile hosts) plus default on-disk locations for
//! the entity store and the resource cache.
//!
//! Configuration is stored at `~/.config/waycache/config.json`.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/store/cache directory paths
const APP_NAME: &str = "waycache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Entity store document name
const STORE_FILE: &str = "entities.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Version-qualified generation name. Bumping it and activating is the
    /// sole mechanism for invalidating previously cached resources.
    pub generation: String,
    /// App-shell manifest: URLs pre-cached at install and served
    /// cache-first.
    pub app_shell: Vec<String>,
    /// Root document returned when an offline navigation has no cached
    /// entry of its own. Should also appear in `app_shell`.
    pub root_document: String,
    /// Tile-provider hosts served stale-while-revalidate (subdomains
    /// included).
    pub tile_hosts: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            generation: format!("{APP_NAME}-v1"),
            app_shell: Vec::new(),
            root_document: String::new(),
            tile_hosts: Vec::new(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Default location of the entity store document.
    pub fn store_path(&self) -> Result<PathBuf> {
        let data_dir =
            dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME).join(STORE_FILE))
    }

    /// Default root directory for cache generations.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir =
            dirs::cache_dir().ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_generation_is_version_qualified() {
        let config = Config::default();
        assert!(config.generation.starts_with(APP_NAME));
        assert!(config.app_shell.is_empty());
    }

    #[test]
    fn test_config_roundtrips_through_json() {
        let config = Config {
            generation: "waycache-v3".to_string(),
            app_shell: vec!["https://app.test/index.html".to_string()],
            root_document: "https://app.test/index.html".to_string(),
            tile_hosts: vec!["tile.openstreetmap.org".to_string()],
        };

        let raw = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&raw).unwrap();

        assert_eq!(parsed.generation, config.generation);
        assert_eq!(parsed.app_shell, config.app_shell);
        assert_eq!(parsed.tile_hosts, config.tile_hosts);
    }
}
