//! # Engine Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     PHONEDESK_DB_PATH=/var/lib/phonedesk/phonedesk.db                  │
//! │     PHONEDESK_ALLOW_OVERSELL=true                                      │
//! │     PHONEDESK_ACTOR=front-desk                                         │
//! │     PHONEDESK_LOCATION_ID=mall                                         │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/phonedesk/engine.toml (Linux)                            │
//! │     ~/Library/Application Support/com.phonedesk.engine/engine.toml     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "phonedesk.db"
//! max_connections = 5
//!
//! [sales]
//! allow_oversell = false
//! default_actor = "system"
//! default_location_id = "main"
//!
//! [events]
//! channel_capacity = 256
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use phonedesk_db::DbConfig;

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Sections
// =============================================================================

/// `[database]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("phonedesk.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// `[sales]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesSettings {
    /// Sell items that are not AVAILABLE, with a warning, instead of
    /// refusing. Off by default.
    #[serde(default)]
    pub allow_oversell: bool,

    /// Recorded on deduction log entries when the request names no actor.
    #[serde(default = "default_actor")]
    pub default_actor: String,

    #[serde(default)]
    pub default_location_id: Option<String>,
}

fn default_actor() -> String {
    "system".to_string()
}

impl Default for SalesSettings {
    fn default() -> Self {
        SalesSettings {
            allow_oversell: false,
            default_actor: default_actor(),
            default_location_id: None,
        }
    }
}

/// `[events]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSettings {
    /// Events buffered per subscriber before slow ones start lagging.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for EventSettings {
    fn default() -> Self {
        EventSettings {
            channel_capacity: default_channel_capacity(),
        }
    }
}

// =============================================================================
// Engine Config
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub sales: SalesSettings,

    #[serde(default)]
    pub events: EventSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (engine.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> EngineResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| EngineError::Config("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Engine config saved");
        Ok(())
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.sales.default_actor.trim().is_empty() {
            return Err(EngineError::Config("default_actor must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(EngineError::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.events.channel_capacity == 0 {
            return Err(EngineError::Config(
                "channel_capacity must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("PHONEDESK_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(flag) = lookup("PHONEDESK_ALLOW_OVERSELL") {
            match flag.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.sales.allow_oversell = true,
                "0" | "false" | "no" | "off" => self.sales.allow_oversell = false,
                _ => warn!(value = %flag, "Unknown PHONEDESK_ALLOW_OVERSELL value"),
            }
        }

        if let Some(actor) = lookup("PHONEDESK_ACTOR") {
            self.sales.default_actor = actor;
        }

        if let Some(location) = lookup("PHONEDESK_LOCATION_ID") {
            let location = location.trim().to_string();
            self.sales.default_location_id = (!location.is_empty()).then_some(location);
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "phonedesk", "engine")
            .map(|dirs| dirs.config_dir().join("engine.toml"))
    }

    /// Pool settings for [`phonedesk_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone()).max_connections(self.database.max_connections)
    }
}
