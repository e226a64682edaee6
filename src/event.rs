//! Normalized connection events and the event stream.
//!
//! This module defines the cross-platform event model, its flat wire form,
//! and the single-subscriber stream that carries events to consumers.

use std::{collections::BTreeMap, sync::Arc};

use log::trace;
use parking_lot::Mutex;
use serde::Serialize;
use smol_str::SmolStr;

use crate::device::{adapter::AdapterState, classify::DeviceType};

/// Name reported when the platform does not provide one.
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown Device";

/// Signal strength reported for connected devices. No audio-route API
/// exposes a real measurement, so this is a fixed "unknown" marker.
pub const SIGNAL_STRENGTH_PLACEHOLDER: i32 = -50;

/// Battery level reported when the platform does not expose one.
pub const BATTERY_LEVEL_UNKNOWN: i32 = -1;

/// Event name for adapter state changes outside the four power states.
pub const EVENT_STATE_CHANGED: &str = "BLUETOOTH_STATE_CHANGED";
pub const EVENT_CONNECTED: &str = "CONNECTED";
pub const EVENT_DISCONNECTED: &str = "DISCONNECTED";

// Wire keys
pub const KEY_EVENT: &str = "event";
pub const KEY_NAME: &str = "name";
pub const KEY_ADDRESS: &str = "address";
pub const KEY_DEVICE_TYPE: &str = "deviceType";
pub const KEY_RSSI: &str = "rssi";
pub const KEY_BATTERY_LEVEL: &str = "batteryLevel";
pub const KEY_STATE: &str = "state";

/// Coarse event category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
   Connected,
   Disconnected,
   AdapterStateChanged,
}

/// Identity of the device an event refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
   pub name: SmolStr,
   pub address: SmolStr,
   pub device_type: DeviceType,
}

impl DeviceIdentity {
   /// Builds an identity, substituting [`UNKNOWN_DEVICE_NAME`] for a missing
   /// or blank name.
   pub fn new(name: Option<&str>, address: impl Into<SmolStr>, device_type: DeviceType) -> Self {
      let name = match name.map(str::trim) {
         Some(name) if !name.is_empty() => SmolStr::new(name),
         _ => SmolStr::new_static(UNKNOWN_DEVICE_NAME),
      };
      Self {
         name,
         address: address.into(),
         device_type,
      }
   }
}

/// A normalized event, ready to hand to the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
   Connected {
      device: DeviceIdentity,
      adapter_state: Option<AdapterState>,
   },
   Disconnected {
      device: DeviceIdentity,
      adapter_state: Option<AdapterState>,
   },
   AdapterStateChanged {
      state: AdapterState,
   },
}

impl ConnectionEvent {
   pub const fn kind(&self) -> EventKind {
      match self {
         Self::Connected { .. } => EventKind::Connected,
         Self::Disconnected { .. } => EventKind::Disconnected,
         Self::AdapterStateChanged { .. } => EventKind::AdapterStateChanged,
      }
   }

   /// The `event` field on the wire.
   pub fn event_name(&self) -> &'static str {
      match self {
         Self::Connected { .. } => EVENT_CONNECTED,
         Self::Disconnected { .. } => EVENT_DISCONNECTED,
         Self::AdapterStateChanged { state } if state.is_power_state() => state.to_str(),
         Self::AdapterStateChanged { .. } => EVENT_STATE_CHANGED,
      }
   }

   pub const fn device(&self) -> Option<&DeviceIdentity> {
      match self {
         Self::Connected { device, .. } | Self::Disconnected { device, .. } => Some(device),
         Self::AdapterStateChanged { .. } => None,
      }
   }

   pub const fn adapter_state(&self) -> Option<AdapterState> {
      match self {
         Self::Connected { adapter_state, .. } | Self::Disconnected { adapter_state, .. } => {
            *adapter_state
         },
         Self::AdapterStateChanged { state } => Some(*state),
      }
   }

   pub const fn signal_strength(&self) -> Option<i32> {
      match self {
         Self::Connected { .. } => Some(SIGNAL_STRENGTH_PLACEHOLDER),
         _ => None,
      }
   }

   pub const fn battery_level(&self) -> Option<i32> {
      match self {
         Self::Connected { .. } => Some(BATTERY_LEVEL_UNKNOWN),
         _ => None,
      }
   }

   /// Flattens the event into its string-keyed wire form.
   pub fn to_record(&self) -> EventRecord {
      let mut record = EventRecord::new();
      record.insert(KEY_EVENT, WireValue::Str(self.event_name().into()));
      if let Some(device) = self.device() {
         record.insert(KEY_NAME, WireValue::Str(device.name.clone()));
         record.insert(KEY_ADDRESS, WireValue::Str(device.address.clone()));
         record.insert(
            KEY_DEVICE_TYPE,
            WireValue::Str(device.device_type.to_str().into()),
         );
      }
      if let Some(rssi) = self.signal_strength() {
         record.insert(KEY_RSSI, WireValue::Int(rssi.into()));
      }
      if let Some(level) = self.battery_level() {
         record.insert(KEY_BATTERY_LEVEL, WireValue::Int(level.into()));
      }
      if let Some(state) = self.adapter_state() {
         record.insert(KEY_STATE, WireValue::Str(state.to_str().into()));
      }
      record
   }

   pub fn to_json(&self) -> serde_json::Value {
      serde_json::to_value(self.to_record()).unwrap_or_default()
   }
}

/// A value in a wire record: strings or integers only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum WireValue {
   Str(SmolStr),
   Int(i64),
}

/// Flat string-keyed map emitted on the event stream.
pub type EventRecord = BTreeMap<&'static str, WireValue>;

/// One entry of the connected-devices snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
   pub name: SmolStr,
   pub address: SmolStr,
   pub device_type: DeviceType,
   pub battery_level: i32,
   pub rssi: i32,
}

impl From<DeviceIdentity> for DeviceInfo {
   fn from(device: DeviceIdentity) -> Self {
      Self {
         name: device.name,
         address: device.address,
         device_type: device.device_type,
         battery_level: BATTERY_LEVEL_UNKNOWN,
         rssi: SIGNAL_STRENGTH_PLACEHOLDER,
      }
   }
}

/// Trait for implementing event emission.
pub trait EventSink: Send + Sync {
   fn emit(&self, event: &ConnectionEvent);
}

/// Type alias for a thread-safe event sink.
pub type EventSender = Arc<dyn EventSink>;

/// Event stream with at most one active subscriber.
///
/// Events published while nobody listens are dropped.
#[derive(Default)]
pub struct StreamHandler {
   sink: Mutex<Option<EventSender>>,
}

impl StreamHandler {
   pub fn new() -> Arc<Self> {
      Arc::new(Self::default())
   }

   /// Installs `sink` as the subscriber, replacing any previous one.
   pub fn listen(&self, sink: EventSender) {
      *self.sink.lock() = Some(sink);
   }

   /// Detaches the current subscriber. Returns whether one was installed.
   pub fn cancel(&self) -> bool {
      self.sink.lock().take().is_some()
   }

   pub fn is_listening(&self) -> bool {
      self.sink.lock().is_some()
   }

   /// Forwards `event` to the subscriber. Returns `false` if it was dropped.
   pub fn publish(&self, event: &ConnectionEvent) -> bool {
      // Clone out so the sink runs without the slot locked.
      let sink = self.sink.lock().clone();
      match sink {
         Some(sink) => {
            sink.emit(event);
            true
         },
         None => {
            trace!("No listener, dropping {}", event.event_name());
            false
         },
      }
   }
}

impl EventSink for StreamHandler {
   fn emit(&self, event: &ConnectionEvent) {
      self.publish(event);
   }
}

#[cfg(test)]
pub(crate) mod tests {
   use serde_json::json;

   use super::*;

   /// Sink that keeps everything it receives.
   #[derive(Default)]
   pub(crate) struct Recorder(pub Mutex<Vec<ConnectionEvent>>);

   impl EventSink for Recorder {
      fn emit(&self, event: &ConnectionEvent) {
         self.0.lock().push(event.clone());
      }
   }

   fn headphones() -> DeviceIdentity {
      DeviceIdentity::new(Some("AirPods Pro"), "AA:BB:CC:DD:EE:FF", DeviceType::Headphones)
   }

   #[test]
   fn test_identity_sentinel_name() {
      let device = DeviceIdentity::new(None, "00:11:22:33:44:55", DeviceType::Unknown);
      assert_eq!(device.name, UNKNOWN_DEVICE_NAME);
      let device = DeviceIdentity::new(Some("  "), "00:11:22:33:44:55", DeviceType::Unknown);
      assert_eq!(device.name, UNKNOWN_DEVICE_NAME);
   }

   #[test]
   fn test_connected_record() {
      let event = ConnectionEvent::Connected {
         device: headphones(),
         adapter_state: None,
      };
      assert_eq!(
         event.to_json(),
         json!({
            "event": "CONNECTED",
            "name": "AirPods Pro",
            "address": "AA:BB:CC:DD:EE:FF",
            "deviceType": "Headphones",
            "rssi": -50,
            "batteryLevel": -1,
         })
      );
   }

   #[test]
   fn test_disconnected_record_omits_placeholders() {
      let event = ConnectionEvent::Disconnected {
         device: headphones(),
         adapter_state: Some(AdapterState::On),
      };
      assert_eq!(
         event.to_json(),
         json!({
            "event": "DISCONNECTED",
            "name": "AirPods Pro",
            "address": "AA:BB:CC:DD:EE:FF",
            "deviceType": "Headphones",
            "state": "BLUETOOTH_ON",
         })
      );
   }

   #[test]
   fn test_adapter_record() {
      let event = ConnectionEvent::AdapterStateChanged {
         state: AdapterState::TurningOff,
      };
      assert_eq!(
         event.to_json(),
         json!({ "event": "BLUETOOTH_TURNING_OFF", "state": "BLUETOOTH_TURNING_OFF" })
      );

      let event = ConnectionEvent::AdapterStateChanged {
         state: AdapterState::Unauthorized,
      };
      assert_eq!(event.event_name(), EVENT_STATE_CHANGED);
      assert!(event.device().is_none());
      assert!(!event.to_record().contains_key(KEY_ADDRESS));
   }

   #[test]
   fn test_device_info_json() {
      let info = DeviceInfo::from(DeviceIdentity::new(
         Some("Car Kit"),
         "11:22:33:44:55:66",
         DeviceType::CarAudio,
      ));
      assert_eq!(
         serde_json::to_value(&info).unwrap(),
         json!({
            "name": "Car Kit",
            "address": "11:22:33:44:55:66",
            "deviceType": "Car Audio",
            "batteryLevel": -1,
            "rssi": -50,
         })
      );
   }

   #[test]
   fn test_stream_single_subscriber() {
      let stream = StreamHandler::new();
      let event = ConnectionEvent::AdapterStateChanged {
         state: AdapterState::On,
      };

      // Nobody listening: dropped
      assert!(!stream.publish(&event));

      let first = Arc::new(Recorder::default());
      let second = Arc::new(Recorder::default());
      stream.listen(first.clone());
      assert!(stream.publish(&event));
      stream.listen(second.clone());
      assert!(stream.publish(&event));

      assert_eq!(first.0.lock().len(), 1);
      assert_eq!(second.0.lock().len(), 1);

      assert!(stream.cancel());
      assert!(!stream.is_listening());
      assert!(!stream.publish(&event));
      assert!(!stream.cancel());
      assert_eq!(second.0.lock().len(), 1);
   }
}
