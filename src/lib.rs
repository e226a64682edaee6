//! Bluetooth connection state normalization.
//!
//! Raw adapter and device notifications are classified and turned into a
//! uniform [`event::ConnectionEvent`] stream by [`normalizer::Normalizer`].
//! The BlueZ monitor and the D-Bus surface are built on top of that core.

pub mod bluetooth;
pub mod commands;
pub mod config;
pub mod dbus;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod normalizer;
pub mod snapshot;
