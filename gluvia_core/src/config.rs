//! Configuration file support for Gluvia.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/gluvia/config.toml`.

use crate::history::{MAX_HISTORY_DAYS, MIN_HISTORY_DAYS};
use crate::questionnaire::EvaluationOptions;
use crate::{Error, MealCount, Result, SlotSet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub history: HistoryConfig,
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

/// Which meals are evaluated and how they are counted
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub slot_set: SlotSet,

    #[serde(default)]
    pub meal_count: MealCount,
}

impl From<ScheduleConfig> for EvaluationOptions {
    fn from(schedule: ScheduleConfig) -> Self {
        EvaluationOptions {
            slot_set: schedule.slot_set,
            meal_count: schedule.meal_count,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_days")]
    pub default_days: i64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_days: default_history_days(),
        }
    }
}

fn home_relative(sub: &str) -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(sub))
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(|| home_relative(".local/share"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gluvia")
}

fn default_history_days() -> i64 {
    7
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
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let days = self.history.default_days;
        if !(MIN_HISTORY_DAYS..=MAX_HISTORY_DAYS).contains(&days) {
            return Err(Error::Config(format!(
                "history.default_days must be between {} and {}, got {}",
                MIN_HISTORY_DAYS, MAX_HISTORY_DAYS, days
            )));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .or_else(|| home_relative(".config"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gluvia")
            .join("config.toml")
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

    pub fn evaluation_options(&self) -> EvaluationOptions {
        self.schedule.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.schedule.slot_set, SlotSet::Full);
        assert_eq!(config.schedule.meal_count, MealCount::Submitted);
        assert_eq!(config.history.default_days, 7);
        assert!(config.data.data_dir.ends_with("gluvia"));
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[schedule]
slot_set = "reduced"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.schedule.slot_set, SlotSet::Reduced);
        assert_eq!(config.schedule.meal_count, MealCount::Submitted);
        assert_eq!(config.history.default_days, 7);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.data.data_dir = dir.path().join("data");
        config.schedule.meal_count = MealCount::Visited;
        config.history.default_days = 14;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.data.data_dir, dir.path().join("data"));
        assert_eq!(loaded.schedule.meal_count, MealCount::Visited);
        assert_eq!(loaded.history.default_days, 14);
    }

    #[test]
    fn test_out_of_range_history_days_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[history]\ndefault_days = 90\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_slot_set_is_toml_error() {
        let result: std::result::Result<Config, _> = toml::from_str("[schedule]\nslot_set = \"hourly\"\n");
        assert!(result.is_err());
    }
}
