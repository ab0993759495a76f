//! Settings consumed by the remote loader
//!
//! The loader receives an `Arc<Settings>` at construction and only reads it;
//! nothing in this subsystem mutates configuration at runtime.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Region value meaning "pick automatically from the title"
pub const REGION_VALUE_AUTO_SELECT: i32 = -1;

/// Number of console regions (JPN, USA, EUR, AUS, CHN, KOR, TWN)
pub const REGION_COUNT: u32 = 7;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub system: SystemSettings,
    pub paths: PathSettings,
}

/// Emulated system settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSettings {
    /// Emulated console identifies as a New 3DS
    pub is_new_3ds: bool,
    /// Console region, or `REGION_VALUE_AUTO_SELECT`
    pub region_value: i32,
    /// Route hid input through the Artic server
    pub use_artic_base_controller: bool,
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Emulated NAND root; console-unique data lives below it
    pub nand: PathBuf,
    pub config_savegame: PathBuf,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            is_new_3ds: true,
            region_value: REGION_VALUE_AUTO_SELECT,
            use_artic_base_controller: false,
        }
    }
}

impl Default for PathSettings {
    fn default() -> Self {
        let base = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("oxidized-artic");

        Self {
            nand: base.join("nand"),
            config_savegame: base.join("nand/data/sysdata/config"),
        }
    }
}

impl Settings {
    /// Load configuration from file, or create default if it doesn't exist
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = Self::config_path();

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let settings = Self::default();
            settings.save()?;
            Ok(settings)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("oxidized-artic")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(settings.system.is_new_3ds);
        assert_eq!(settings.system.region_value, REGION_VALUE_AUTO_SELECT);
        assert!(!settings.system.use_artic_base_controller);
    }

    #[test]
    fn test_settings_serialization() {
        let settings = Settings::default();
        let toml_str = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.system.region_value, settings.system.region_value);
    }
}
