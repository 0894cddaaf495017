//! Fetch settings persistence
//!
//! Stores request limits and cover caching preferences in
//! ~/.config/tidalfetch/settings.json. Missing files and missing keys fall
//! back to defaults, so an empty `{}` is a valid settings file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::tidal::QueryKind;

pub const DEFAULT_API_URL: &str = "https://api.tidalhifi.com/v1";
pub const DEFAULT_RESOURCES_URL: &str = "http://resources.tidal.com";

/// Settings that shape every catalog request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Base URL of the TIDAL REST API
    pub api_url: String,
    /// Base URL cover images are served from
    pub resources_url: String,
    /// Requested cover resolution, e.g. "640x640"
    pub cover_size: String,
    /// Items requested per page
    pub page_size: u32,
    /// Maximum number of artists expanded per request
    pub artists_limit: usize,
    /// Maximum number of albums expanded per request
    pub albums_limit: usize,
    /// Maximum number of songs taken from a top-level song list
    pub songs_limit: usize,
    /// Expand every listed track to its full album
    pub fetch_albums: bool,
    /// Download album covers into the local cache
    pub cache_album_covers: bool,
    /// HTTP timeout per request, in seconds
    pub timeout_secs: u64,
    /// Override for the cover cache directory
    pub cover_cache_dir: Option<PathBuf>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            resources_url: DEFAULT_RESOURCES_URL.to_string(),
            cover_size: "640x640".to_string(),
            page_size: 100,
            artists_limit: 50,
            albums_limit: 200,
            songs_limit: 500,
            fetch_albums: false,
            cache_album_covers: true,
            timeout_secs: 30,
            cover_cache_dir: None,
        }
    }
}

impl FetchSettings {
    /// Load settings from disk, or defaults if no file exists yet
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            debug!("No settings found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings from {:?}", path))?;

        let settings: Self =
            serde_json::from_str(&contents).with_context(|| "Failed to parse settings")?;

        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let contents =
            serde_json::to_string_pretty(self).context("Failed to serialize settings")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write settings to {:?}", path))?;

        debug!("Saved settings to {:?}", path);
        Ok(path)
    }

    /// Get the settings file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("tidalfetch").join("settings.json"))
    }

    /// Directory album covers are cached in
    pub fn cover_cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cover_cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine cache directory"))?;
        Ok(cache_dir.join("tidalfetch").join("albumcovers"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Cap on top-level entities taken from a list of the given kind
    pub fn limit_for(&self, kind: QueryKind) -> usize {
        match kind {
            QueryKind::Artists => self.artists_limit,
            QueryKind::Albums => self.albums_limit,
            QueryKind::Songs => self.songs_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let settings: FetchSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, FetchSettings::default());
    }

    #[test]
    fn test_partial_file_overrides() {
        let settings: FetchSettings =
            serde_json::from_str(r#"{ "page_size": 20, "fetch_albums": true }"#).unwrap();
        assert_eq!(settings.page_size, 20);
        assert!(settings.fetch_albums);
        assert_eq!(settings.cover_size, "640x640");
    }

    #[test]
    fn test_cover_cache_dir_override() {
        let settings = FetchSettings {
            cover_cache_dir: Some(PathBuf::from("/tmp/covers")),
            ..Default::default()
        };
        assert_eq!(settings.cover_cache_dir().unwrap(), PathBuf::from("/tmp/covers"));
    }

    #[test]
    fn test_limit_for_kind() {
        let settings = FetchSettings::default();
        assert_eq!(settings.limit_for(QueryKind::Artists), 50);
        assert_eq!(settings.limit_for(QueryKind::Songs), 500);
    }
}
