//! Configuration file support for nutri.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/nutri/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub insights: InsightsConfig,

    #[serde(default)]
    pub targets: TargetsConfig,

    #[serde(default)]
    pub inventory: InventoryConfig,
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

/// Thresholds used when turning an intake summary into insights
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InsightsConfig {
    /// Daily average below `ratio * tdee` counts as under-eating
    #[serde(default = "default_under_eating_ratio")]
    pub under_eating_ratio: f64,

    /// Daily average above `ratio * tdee` counts as over-eating
    #[serde(default = "default_over_eating_ratio")]
    pub over_eating_ratio: f64,

    /// Average protein per logged entry, in grams
    #[serde(default = "default_protein_floor_g")]
    pub protein_floor_g: f64,

    #[serde(default = "default_period_days")]
    pub period_days: u32,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            under_eating_ratio: default_under_eating_ratio(),
            over_eating_ratio: default_over_eating_ratio(),
            protein_floor_g: default_protein_floor_g(),
            period_days: default_period_days(),
        }
    }
}

/// Daily target display configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TargetsConfig {
    /// Shown when the profile has no estimate yet
    #[serde(default = "default_fallback_daily_calories")]
    pub fallback_daily_calories: u32,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            fallback_daily_calories: default_fallback_daily_calories(),
        }
    }
}

/// Pantry alert thresholds
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Items expiring within this many whole days raise an alert
    #[serde(default = "default_expiry_window_days")]
    pub expiry_window_days: u32,

    /// Alerts at or under this many days are urgent rather than warnings
    #[serde(default = "default_urgent_within_days")]
    pub urgent_within_days: u32,

    /// Threshold given to new items that don't set their own
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: f64,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            expiry_window_days: default_expiry_window_days(),
            urgent_within_days: default_urgent_within_days(),
            low_stock_threshold: default_low_stock_threshold(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|| PathBuf::from("."))
    });
    base.join("nutri")
}

fn default_under_eating_ratio() -> f64 {
    0.8
}

fn default_over_eating_ratio() -> f64 {
    1.3
}

fn default_protein_floor_g() -> f64 {
    15.0
}

fn default_period_days() -> u32 {
    7
}

fn default_fallback_daily_calories() -> u32 {
    2000
}

fn default_expiry_window_days() -> u32 {
    3
}

fn default_urgent_within_days() -> u32 {
    1
}

fn default_low_stock_threshold() -> f64 {
    2.0
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        base.join("nutri").join("config.toml")
    }

    /// Reject thresholds that would make insights meaningless
    pub fn validate(&self) -> Result<()> {
        let insights = &self.insights;
        if !(insights.under_eating_ratio > 0.0) || !(insights.over_eating_ratio > 0.0) {
            return Err(Error::Config(
                "insight ratios must be greater than zero".into(),
            ));
        }
        if insights.under_eating_ratio >= insights.over_eating_ratio {
            return Err(Error::Config(format!(
                "under_eating_ratio ({}) must be below over_eating_ratio ({})",
                insights.under_eating_ratio, insights.over_eating_ratio
            )));
        }
        if insights.period_days == 0 {
            return Err(Error::Config("period_days must be at least 1".into()));
        }

        let inventory = &self.inventory;
        if inventory.urgent_within_days > inventory.expiry_window_days {
            return Err(Error::Config(format!(
                "urgent_within_days ({}) must not exceed expiry_window_days ({})",
                inventory.urgent_within_days, inventory.expiry_window_days
            )));
        }
        if !inventory.low_stock_threshold.is_finite() || inventory.low_stock_threshold < 0.0 {
            return Err(Error::Config(
                "low_stock_threshold must be a non-negative number".into(),
            ));
        }
        Ok(())
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.insights.under_eating_ratio, 0.8);
        assert_eq!(config.insights.over_eating_ratio, 1.3);
        assert_eq!(config.insights.protein_floor_g, 15.0);
        assert_eq!(config.insights.period_days, 7);
        assert_eq!(config.targets.fallback_daily_calories, 2000);
        assert_eq!(config.inventory.expiry_window_days, 3);
        assert_eq!(config.inventory.urgent_within_days, 1);
        assert_eq!(config.inventory.low_stock_threshold, 2.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[insights]
period_days = 14
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.insights.period_days, 14);
        assert_eq!(config.insights.over_eating_ratio, 1.3); // default
        assert_eq!(config.targets.fallback_daily_calories, 2000); // default
    }

    #[test]
    fn test_save_and_load_from_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.data.data_dir = temp_dir.path().join("data");
        config.targets.fallback_daily_calories = 1800;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.data.data_dir, temp_dir.path().join("data"));
        assert_eq!(loaded.targets.fallback_daily_calories, 1800);
    }

    #[test]
    fn test_inverted_ratios_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[insights]\nunder_eating_ratio = 1.5\nover_eating_ratio = 1.2\n",
        )
        .unwrap();

        match Config::load_from(&path) {
            Err(Error::Config(msg)) => assert!(msg.contains("under_eating_ratio")),
            other => panic!("Expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_period_rejected() {
        let mut config = Config::default();
        config.insights.period_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_urgent_window_beyond_alert_window_rejected() {
        let mut config = Config::default();
        config.inventory.urgent_within_days = 5;
        match config.validate() {
            Err(Error::Config(msg)) => assert!(msg.contains("urgent_within_days")),
            other => panic!("Expected config error, got {:?}", other),
        }
    }
}
