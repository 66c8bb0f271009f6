//! Server configuration.
//!
//! Loaded from a JSON file when present, otherwise every field falls back to
//! its built-in default. Missing fields in a partial file are defaulted too.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "MUD_CONFIG";

/// Config file used when the environment does not name one
pub const DEFAULT_CONFIG_PATH: &str = "mud.json";

/// Tunable timing and location settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Heartbeat period in seconds
    pub tick_secs: f64,
    /// Seconds after the last combat activity before an entity leaves combat
    pub combat_window_secs: f64,
    /// Seconds a dead player waits before reviving
    pub death_respawn_secs: f64,
    /// Base period between monster AI decisions
    pub ai_period_secs: f64,
    /// Uniform jitter applied to the AI period after each decision
    pub ai_jitter_secs: f64,
    /// Interval between auto-attack swings
    pub auto_attack_secs: f64,
    pub rest_pulses: u32,
    pub rest_interval_secs: f64,
    /// Room players revive in and recall to
    pub default_room: String,
    pub listen_addr: String,
    pub save_dir: PathBuf,
    pub save_interval_secs: u64,
    pub catalog_path: PathBuf,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_secs: 1.0,
            combat_window_secs: 10.0,
            death_respawn_secs: 15.0,
            ai_period_secs: 3.0,
            ai_jitter_secs: 1.0,
            auto_attack_secs: 2.5,
            rest_pulses: 6,
            rest_interval_secs: 10.0,
            default_room: "trade_district".into(),
            listen_addr: format!("0.0.0.0:{}", mud_shared::DEFAULT_PORT),
            save_dir: PathBuf::from("saves"),
            save_interval_secs: 60,
            catalog_path: PathBuf::from("data/catalog.json"),
            seed: None,
        }
    }
}

fn secs(value: f64, fallback: f64) -> Duration {
    Duration::try_from_secs_f64(value)
        .ok()
        .filter(|d| !d.is_zero())
        .unwrap_or_else(|| Duration::from_secs_f64(fallback))
}

impl GameConfig {
    /// Parse a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the config file, falling back to defaults if it is missing or broken.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(ConfigError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                info!("No config at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                error!("{}; using defaults", e);
                Self::default()
            }
        }
    }

    /// Resolve the config path from the environment
    pub fn path_from_env() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn tick(&self) -> Duration {
        secs(self.tick_secs, 1.0)
    }

    pub fn combat_window(&self) -> Duration {
        secs(self.combat_window_secs, 10.0)
    }

    pub fn death_respawn(&self) -> Duration {
        secs(self.death_respawn_secs, 15.0)
    }

    pub fn auto_attack_interval(&self) -> Duration {
        secs(self.auto_attack_secs, 2.5)
    }

    pub fn rest_interval(&self) -> Duration {
        secs(self.rest_interval_secs, 10.0)
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_secs.max(1))
    }
}
