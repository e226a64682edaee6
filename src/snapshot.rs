//! Connected-devices snapshot.

use std::fmt::Display;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
   event::DeviceInfo,
   normalizer::{RawDevice, RawNotification},
};

/// Which devices a snapshot reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotMode {
   /// Devices with a live connection.
   #[default]
   Connected,
   /// Bonded devices that have a name, whether or not they are connected.
   /// Cheap approximation for platforms that gate live state behind extra
   /// permissions.
   Bonded,
}

/// One device or audio route as listed by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
   pub device: RawDevice,
   pub connected: bool,
   pub bonded: bool,
}

impl RouteEntry {
   fn selected(&self, mode: SnapshotMode) -> bool {
      if self.device.is_builtin() {
         return false;
      }
      match mode {
         SnapshotMode::Connected => self.connected,
         SnapshotMode::Bonded => self.bonded && self.device.name.is_some(),
      }
   }
}

/// Classifies the platform's device list, leaving out internal endpoints.
pub fn list_connected_devices(
   entries: impl IntoIterator<Item = RouteEntry>,
   mode: SnapshotMode,
) -> Vec<DeviceInfo> {
   entries
      .into_iter()
      .filter(|entry| entry.selected(mode))
      .map(|entry| DeviceInfo::from(entry.device.identity()))
      .collect()
}

/// Like [`list_connected_devices`], but an unreadable list (permission
/// denied, adapter gone) yields an empty snapshot instead of an error.
pub fn list_or_empty<E: Display>(
   entries: Result<Vec<RouteEntry>, E>,
   mode: SnapshotMode,
) -> Vec<DeviceInfo> {
   match entries {
      Ok(entries) => list_connected_devices(entries, mode),
      Err(e) => {
         warn!("Device list unavailable, reporting none: {e}");
         Vec::new()
      },
   }
}

/// Connect notifications for the devices that are already connected, used
/// to bring a new subscriber up to date.
pub fn announcements(entries: impl IntoIterator<Item = RouteEntry>) -> Vec<RawNotification> {
   entries
      .into_iter()
      .filter(|entry| entry.selected(SnapshotMode::Connected))
      .map(|entry| RawNotification::DeviceConnected(entry.device))
      .collect()
}
