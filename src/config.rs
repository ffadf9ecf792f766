use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::archive::ArchiveOptions;
use crate::geocode::DEFAULT_ENDPOINT;
use crate::request::{PropertyKind, PropertySpec};

/// Top-level configuration for tripnote.
///
/// Holds the geocoding credential, where notes live inside the note library,
/// archive behavior, and the default property list.
///
/// # Loading
///
/// ```rust,no_run
/// use tripnote::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.geocoder.api_key = "your-amap-key".into();
/// config.archive.enabled = true;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub geocoder: GeocoderConfig,
    pub notes: NotesConfig,
    pub archive: ArchiveOptions,
    /// Frontmatter properties written to every trip note, in order.
    pub properties: Vec<PropertySpec>,
}

/// Coordinate conversion service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub api_key: String,
    pub endpoint: String,
    /// Maximum number of requests in flight.
    pub concurrency: usize,
    pub timeout_secs: u64,
}

/// Where generated notes point inside the note library.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesConfig {
    /// Folder holding trip folders, relative to the note library root.
    pub library_path: String,
    /// Photo file extension to pick up (case-insensitive).
    pub photo_extension: String,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            concurrency: 4,
            timeout_secs: 10,
        }
    }
}

impl GeocoderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            library_path: String::new(),
            photo_extension: "jpg".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            geocoder: GeocoderConfig::default(),
            notes: NotesConfig::default(),
            archive: ArchiveOptions::default(),
            properties: vec![
                PropertySpec::new(PropertyKind::Tags, "tags", "travel"),
                PropertySpec::new(PropertyKind::CssClasses, "cssclasses", "wide-page"),
            ],
        }
    }
}

impl Config {
    /// Resolve the config file path: same directory as the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Reject settings the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.archive.quality) {
            anyhow::bail!(
                "archive.quality must be between 1 and 100, got {}",
                self.archive.quality
            );
        }
        if self.geocoder.concurrency == 0 {
            anyhow::bail!("geocoder.concurrency must be at least 1");
        }
        if self.notes.photo_extension.trim_start_matches('.').is_empty() {
            anyhow::bail!("notes.photo_extension is empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.archive.quality, 100);
        assert_eq!(config.notes.photo_extension, "jpg");
        assert_eq!(config.geocoder.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.geocoder.api_key = "abc".into();
        config.archive.quality = 85;
        config.save(Some(&path)).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.geocoder.api_key, "abc");
        assert_eq!(loaded.archive.quality, 85);
        assert_eq!(loaded.properties, config.properties);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.json"))).unwrap();
        assert_eq!(config.geocoder.concurrency, 4);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"geocoder":{"api_key":"k"},"notes":{"library_path":"Trips"}}"#).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.geocoder.api_key, "k");
        assert_eq!(config.geocoder.timeout_secs, 10);
        assert_eq!(config.notes.library_path, "Trips");
        assert_eq!(config.notes.photo_extension, "jpg");
    }

    #[test]
    fn out_of_range_quality_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"archive":{"enabled":true,"path":null,"quality":0,"delete_originals":false}}"#)
            .unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }
}
