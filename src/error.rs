//! Error types for the Bluetooth monitor service.
//!
//! Nothing in the normalization path is fatal; these errors cover the
//! surrounding plumbing (BlueZ session, D-Bus connection, configuration).

use thiserror::Error;

/// Main error type for the monitor service.
#[derive(Error, Debug)]
pub enum MonitorError {
   #[error("Bluetooth error: {0}")]
   Bluetooth(#[from] bluer::Error),

   #[error("D-Bus error: {0}")]
   DBus(#[from] zbus::Error),

   #[error("D-Bus connection error: {0}")]
   DBusConnection(#[from] zbus::fdo::Error),

   #[error("I/O error: {0}")]
   Io(#[from] std::io::Error),

   #[error("Could not determine config directory")]
   ConfigDirNotFound,

   #[error("TOML parsing error: {0}")]
   TomlParse(#[from] toml::de::Error),

   #[error("TOML serialization error: {0}")]
   TomlSerialize(#[from] toml::ser::Error),

   #[error("Monitor has been shut down")]
   MonitorShutdown,

   #[error("Adapter not found")]
   AdapterNotFound,
}

/// Convenience type alias for Results with `MonitorError`.
pub type Result<T> = std::result::Result<T, MonitorError>;
