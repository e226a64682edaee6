//! BlueZ side of the monitor.
//!
//! This module watches the system adapter and its devices and feeds their
//! property changes to the normalizer.

pub mod monitor;
pub mod profiles;
