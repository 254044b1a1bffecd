//! Configuration file support for Remedi.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/remedi/config.toml`.
//! All limits the engines enforce (daily frequency, dose interval, trial
//! duration, refund windows) are supplied here rather than hardcoded.

use crate::{Error, Result};
use chrono::NaiveTime;
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
    pub periods: PeriodTimes,

    #[serde(default)]
    pub trial: TrialConfig,
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

/// Schedule engine limits
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Maximum allowed doses per day
    #[serde(default = "default_max_daily_frequency")]
    pub max_daily_frequency: u8,

    /// Days of active schedule generated by default
    #[serde(default = "default_schedule_days_ahead")]
    pub schedule_days_ahead: u32,

    /// Minimum hours between consecutive doses on the same day
    #[serde(default = "default_minimum_dose_interval_hours")]
    pub minimum_dose_interval_hours: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            max_daily_frequency: default_max_daily_frequency(),
            schedule_days_ahead: default_schedule_days_ahead(),
            minimum_dose_interval_hours: default_minimum_dose_interval_hours(),
        }
    }
}

/// Default clock times for the named periods
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeriodTimes {
    #[serde(default = "default_breakfast")]
    pub breakfast: NaiveTime,

    #[serde(default = "default_lunch")]
    pub lunch: NaiveTime,

    #[serde(default = "default_dinner")]
    pub dinner: NaiveTime,

    #[serde(default = "default_bedtime")]
    pub bedtime: NaiveTime,
}

impl Default for PeriodTimes {
    fn default() -> Self {
        Self {
            breakfast: default_breakfast(),
            lunch: default_lunch(),
            dinner: default_dinner(),
            bedtime: default_bedtime(),
        }
    }
}

impl PeriodTimes {
    /// Resolve a named period to its configured clock time
    pub fn time_for(&self, period: crate::TimePeriod) -> NaiveTime {
        match period {
            crate::TimePeriod::Breakfast => self.breakfast,
            crate::TimePeriod::Lunch => self.lunch,
            crate::TimePeriod::Dinner => self.dinner,
            crate::TimePeriod::Bedtime => self.bedtime,
        }
    }
}

/// Trial and cancellation policy parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrialConfig {
    /// Fixed trial length in days
    #[serde(default = "default_trial_duration_days")]
    pub trial_duration_days: i64,

    /// Cancellations before this many days are free (nothing was charged)
    #[serde(default = "default_free_cancellation_days")]
    pub free_cancellation_days: i64,

    /// Cancellations on or after this many days are blocked from refunds
    #[serde(default = "default_refund_window_days")]
    pub refund_window_days: i64,

    /// Days of access retained after a mid-window cancellation
    #[serde(default = "default_access_retention_days")]
    pub access_retention_days: i64,

    /// Billing period length, bounds access for blocked cancellations
    #[serde(default = "default_billing_period_days")]
    pub billing_period_days: i64,

    #[serde(default = "default_monthly_price")]
    pub monthly_price: f64,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            trial_duration_days: default_trial_duration_days(),
            free_cancellation_days: default_free_cancellation_days(),
            refund_window_days: default_refund_window_days(),
            access_retention_days: default_access_retention_days(),
            billing_period_days: default_billing_period_days(),
            monthly_price: default_monthly_price(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME").expect("HOME environment variable not set");
        PathBuf::from(home).join(".local/share")
    });
    base.join("remedi")
}

fn default_max_daily_frequency() -> u8 {
    3
}

fn default_schedule_days_ahead() -> u32 {
    5
}

fn default_minimum_dose_interval_hours() -> u32 {
    4
}

fn default_breakfast() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).unwrap()
}

fn default_lunch() -> NaiveTime {
    NaiveTime::from_hms_opt(14, 0, 0).unwrap()
}

fn default_dinner() -> NaiveTime {
    NaiveTime::from_hms_opt(19, 0, 0).unwrap()
}

fn default_bedtime() -> NaiveTime {
    NaiveTime::from_hms_opt(22, 0, 0).unwrap()
}

fn default_trial_duration_days() -> i64 {
    14
}

fn default_free_cancellation_days() -> i64 {
    8
}

fn default_refund_window_days() -> i64 {
    15
}

fn default_access_retention_days() -> i64 {
    15
}

fn default_billing_period_days() -> i64 {
    31
}

fn default_monthly_price() -> f64 {
    9.99
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
        let base = dirs::config_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME").expect("HOME environment variable not set");
            PathBuf::from(home).join(".config")
        });
        base.join("remedi").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
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
