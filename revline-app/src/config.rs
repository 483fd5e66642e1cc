//! Configuration persistence for Revline
//!
//! One TOML file holds both the vehicle and the audio settings. Every
//! section is optional; missing values take their defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use revline_audio::{AudioConfig, AudioError};
use revline_sim::{ConfigError, VehicleConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to write config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Vehicle(#[from] ConfigError),

    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub vehicle: VehicleConfig,
    pub audio: AudioConfig,
}

impl Config {
    /// Load config from the default location
    ///
    /// A missing, unreadable or invalid file yields the defaults.
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            info!(path = %path.display(), "no config file, using defaults");
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config ignored, using defaults");
                Self::default()
            }
        }
    }

    /// Load and validate config from a specific path
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), SettingsError> {
        self.save_to(&Self::config_path())
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("revline")
            .join("config.toml")
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.vehicle.validate()?;
        self.audio.validate()?;
        Ok(())
    }
}
