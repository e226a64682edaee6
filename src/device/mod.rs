//! Device and adapter classification.
//!
//! This module turns the structured codes platforms attach to their
//! notifications (class-of-device, audio port types, adapter power codes)
//! into the fixed cross-platform vocabulary used by emitted events.

pub mod adapter;
pub mod classify;
