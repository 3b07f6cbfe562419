//! # Configuration Management Module
//!
//! Centralised, type-safe configuration with serde defaults and validation.
//!
//! ## Configuration Structure
//!
//! - [`StorageConfig`] - where the home database lives
//! - [`TeleportConfig`] - countdown length, tick cadence, movement tolerance
//! - [`TpaConfig`] - teleport request switch, cooldown and expiry window
//! - [`BackConfig`] - "return to last location" switch and death recording
//! - [`HomesConfig`] - home count limits
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Configuration File Format
//!
//! ```toml
//! [storage]
//! data_dir = "./data/homes"
//!
//! [teleport]
//! delay_seconds = 5
//! tick_interval_ms = 1000
//! movement_tolerance = 1.0
//!
//! [tpa]
//! enabled = true
//! cooldown_seconds = 60
//! request_ttl_seconds = 60
//!
//! [back]
//! enabled = true
//! save_death_location = true
//!
//! [homes]
//! default_limit = 1
//! admin_limit = 100
//! ```
//!
//! Every section and every key is optional; missing values take the defaults above.

use anyhow::{anyhow, bail, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub teleport: TeleportConfig,
    #[serde(default)]
    pub tpa: TpaConfig,
    #[serde(default)]
    pub back: BackConfig,
    #[serde(default)]
    pub homes: HomesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data/homes".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TeleportConfig {
    /// Countdown length before a delayed teleport fires.
    pub delay_seconds: u32,
    /// Interval between countdown ticks (ms).
    pub tick_interval_ms: u64,
    /// Distance (blocks) a traveler may drift before the countdown is cancelled.
    pub movement_tolerance: f64,
}

impl Default for TeleportConfig {
    fn default() -> Self {
        Self {
            delay_seconds: 5,
            tick_interval_ms: 1000,
            movement_tolerance: 1.0,
        }
    }
}

/// Longest accepted countdown tick.
pub const MAX_TICK_INTERVAL_MS: u64 = 60_000;
/// Longest accepted request cooldown or lifetime (30 days).
pub const MAX_TPA_WINDOW_SECONDS: u64 = 30 * 24 * 60 * 60;

impl TeleportConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::milliseconds(self.tick_interval_ms.min(MAX_TICK_INTERVAL_MS) as i64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TpaConfig {
    pub enabled: bool,
    /// Minimum seconds between two successful requests from the same sender.
    pub cooldown_seconds: u64,
    /// Seconds a pending request lives before it expires.
    pub request_ttl_seconds: u64,
}

impl Default for TpaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown_seconds: 60,
            request_ttl_seconds: 60,
        }
    }
}

impl TpaConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::seconds(self.cooldown_seconds.min(MAX_TPA_WINDOW_SECONDS) as i64)
    }

    pub fn request_ttl(&self) -> Duration {
        Duration::seconds(self.request_ttl_seconds.min(MAX_TPA_WINDOW_SECONDS) as i64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackConfig {
    pub enabled: bool,
    /// Record the death position as the last location.
    pub save_death_location: bool,
}

impl Default for BackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            save_death_location: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HomesConfig {
    pub default_limit: u32,
    pub admin_limit: u32,
}

impl Default for HomesConfig {
    fn default() -> Self {
        Self {
            default_limit: 1,
            admin_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Config {
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        Self::from_toml(&content).map_err(|e| anyhow!("Invalid config file {}: {}", path, e))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| anyhow!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.data_dir.trim().is_empty() {
            bail!("storage.data_dir must not be empty");
        }
        if !(1..=MAX_TICK_INTERVAL_MS).contains(&self.teleport.tick_interval_ms) {
            bail!(
                "teleport.tick_interval_ms must be between 1 and {}",
                MAX_TICK_INTERVAL_MS
            );
        }
        let tolerance = self.teleport.movement_tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            bail!("teleport.movement_tolerance must be a non-negative number");
        }
        if !(1..=MAX_TPA_WINDOW_SECONDS).contains(&self.tpa.request_ttl_seconds) {
            bail!(
                "tpa.request_ttl_seconds must be between 1 and {}",
                MAX_TPA_WINDOW_SECONDS
            );
        }
        if self.tpa.cooldown_seconds > MAX_TPA_WINDOW_SECONDS {
            bail!("tpa.cooldown_seconds must be at most {}", MAX_TPA_WINDOW_SECONDS);
        }
        if self.homes.default_limit == 0 {
            bail!("homes.default_limit must be at least 1");
        }
        Ok(())
    }
}
