//! Configuration.
//!
//! Two layers:
//! - [`Preferences`] are user toggles that travel with the playlist in the
//!   key-value store.
//! - [`AppConfig`] describes the host (where data and exports go, how the
//!   embedded player is sized) and lives in a JSON file in the user's config
//!   directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

const APP_DIR_NAME: &str = "tubeloop";

/// Playback preferences.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    /// Skip to the next entry when a video refuses embedded playback.
    #[serde(default = "default_true")]
    pub auto_skip_embed_restricted: bool,
    /// At the end of the list, stop and open all embed-restricted videos on
    /// youtube.com instead of starting over.
    #[serde(default)]
    pub open_disabled_externally: bool,
}

const fn default_true() -> bool {
    true
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            auto_skip_embed_restricted: true,
            open_disabled_externally: false,
        }
    }
}

/// Sizing and placement of the embedded player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerSettings {
    /// Element the player is mounted into.
    #[serde(default = "default_container")]
    pub container: String,
    /// Width, as a CSS length.
    #[serde(default = "default_dimension")]
    pub width: String,
    /// Height, as a CSS length.
    #[serde(default = "default_dimension")]
    pub height: String,
}

fn default_container() -> String {
    "player-container".to_string()
}

fn default_dimension() -> String {
    "100%".to_string()
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            container: default_container(),
            width: default_dimension(),
            height: default_dimension(),
        }
    }
}

/// Host configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Directory holding the key-value store file.
    pub data_directory: PathBuf,
    /// Directory exported lists are written to.
    #[serde(default = "default_export_directory")]
    pub export_directory: PathBuf,
    /// Embedded player settings.
    #[serde(default)]
    pub player: PlayerSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_directory: default_data_directory(),
            export_directory: default_export_directory(),
            player: PlayerSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from `path`, writing defaults there if it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Config file not found, using defaults");
            let config = Self::default();
            if let Err(e) = config.save_to(path) {
                warn!("Failed to save default config: {}", e);
            }
            return Ok(config);
        }

        let content = fs::read_to_string(path).map_err(|e| Error::FileSystem {
            path: path.to_path_buf(),
            message: format!("Failed to read config file: {e}"),
        })?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file: {e}")))?;

        info!("Loaded config from {}", path.display());
        debug!("Data directory: {}", config.data_directory.display());

        Ok(config)
    }

    /// Save configuration to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file_path())
    }

    /// Save configuration to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its directory cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| Error::FileSystem {
                path: parent.to_path_buf(),
                message: format!("Failed to create config directory: {e}"),
            })?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| Error::FileSystem {
            path: path.to_path_buf(),
            message: format!("Failed to write config file: {e}"),
        })?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Get the path to the config file.
    #[must_use]
    pub fn config_file_path() -> PathBuf {
        config_file_path()
    }
}

/// Default directory for the key-value store.
#[must_use]
pub fn default_data_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Default directory for exported lists.
#[must_use]
pub fn default_export_directory() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(APP_DIR_NAME)
        .join("config.json")
}
