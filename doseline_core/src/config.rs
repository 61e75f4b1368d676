//! Configuration file support for Doseline.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/doseline/config.toml`.

use crate::state::Options;
use crate::types::{ColorScheme, ConcentrationUnit, TimeMode};
use crate::{Error, Result};
use chrono::Timelike;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub share: ShareConfig,

    #[serde(default)]
    pub presets: PresetConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Colour scheme setting; `auto` follows the local clock
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorSchemeSetting {
    #[default]
    Auto,
    Day,
    Night,
}

/// Display options applied at startup
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub units: ConcentrationUnit,

    #[serde(default)]
    pub color_scheme: ColorSchemeSetting,

    #[serde(default)]
    pub time_mode: TimeMode,

    #[serde(default)]
    pub cycle_overlay: bool,
}

/// Shareable link configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShareConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// Preset selection
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PresetConfig {
    #[serde(default = "default_startup_preset")]
    pub startup: String,
}

impl Default for PresetConfig {
    fn default() -> Self {
        Self {
            startup: default_startup_preset(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("doseline")
}

fn default_base_url() -> String {
    "https://example.invalid/doseline/".into()
}

fn default_startup_preset() -> String {
    "default".into()
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("doseline").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Reducer options for a session starting at local `hour`
    pub fn options_at(&self, hour: u32) -> Options {
        let color_scheme = match self.display.color_scheme {
            ColorSchemeSetting::Auto => ColorScheme::for_hour(hour),
            ColorSchemeSetting::Day => ColorScheme::Day,
            ColorSchemeSetting::Night => ColorScheme::Night,
        };
        Options {
            units: self.display.units,
            color_scheme,
            time_mode: self.display.time_mode,
            cycle_overlay: self.display.cycle_overlay,
        }
    }

    /// Reducer options for a session starting now
    pub fn options(&self) -> Options {
        self.options_at(chrono::Local::now().hour())
    }
}
