//! Configuration management for the monitor service.
//!
//! This module handles loading and saving configuration from disk.

use std::{
   env, fs,
   path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
   error::{MonitorError, Result},
   snapshot::SnapshotMode,
};

/// Main configuration structure for the service.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
   /// Adapter to monitor (`hci0`, ...). The default adapter when unset.
   #[serde(default)]
   pub adapter: Option<String>,

   #[serde(default)]
   pub snapshot_mode: SnapshotMode,

   /// Seconds between adapter health/state polls.
   #[serde(default = "default_poll_interval")]
   pub poll_interval: u64,

   /// Emit `CONNECTED` for devices that are already connected at start-up.
   #[serde(default = "default_announce_on_start")]
   pub announce_on_start: bool,

   /// Include the last known adapter state in device events.
   #[serde(default)]
   pub attach_adapter_state: bool,
}

const fn default_poll_interval() -> u64 {
   10
}

const fn default_announce_on_start() -> bool {
   true
}

impl Default for Config {
   fn default() -> Self {
      Self {
         adapter: None,
         snapshot_mode: SnapshotMode::default(),
         poll_interval: default_poll_interval(),
         announce_on_start: default_announce_on_start(),
         attach_adapter_state: false,
      }
   }
}

impl Config {
   /// Loads configuration from disk or creates default if not exists.
   pub fn load() -> Result<Self> {
      Self::load_from(&Self::config_path()?)
   }

   pub fn load_from(config_path: &Path) -> Result<Self> {
      if config_path.exists() {
         let contents = fs::read_to_string(config_path)?;
         Ok(toml::from_str(&contents)?)
      } else {
         let config = Self::default();
         config.save_to(config_path)?;
         Ok(config)
      }
   }

   /// Saves the configuration to `config_path`.
   pub fn save_to(&self, config_path: &Path) -> Result<()> {
      if let Some(parent) = config_path.parent() {
         fs::create_dir_all(parent)?;
      }

      let contents = toml::to_string_pretty(self)?;
      fs::write(config_path, contents)?;

      Ok(())
   }

   fn config_path() -> Result<PathBuf> {
      let config_dir = if let Ok(home) = env::var("BTMONITOR_HOME") {
         PathBuf::from(home)
      } else if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
         PathBuf::from(config_home)
      } else if let Ok(home) = env::var("HOME") {
         PathBuf::from(home).join(".config")
      } else {
         dirs::config_dir().ok_or(MonitorError::ConfigDirNotFound)?
      };

      Ok(config_dir.join("btmonitord").join("config.toml"))
   }
}
