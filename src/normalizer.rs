//! Translation of raw platform notifications into [`ConnectionEvent`]s.
//!
//! The normalizer is independent of where notifications come from. It keeps
//! exactly one piece of state, the last adapter state it has seen, so that
//! repeated state reports do not turn into repeated events.

use log::debug;
use smol_str::SmolStr;

use crate::{
   device::{
      adapter::{AdapterCode, AdapterState},
      classify::{self, ClassCode},
   },
   event::{ConnectionEvent, DeviceIdentity},
};

/// Identity and metadata carried by a device notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDevice {
   pub name: Option<SmolStr>,
   pub address: SmolStr,
   pub class: Option<ClassCode>,
}

impl RawDevice {
   pub fn new(address: impl Into<SmolStr>) -> Self {
      Self {
         name: None,
         address: address.into(),
         class: None,
      }
   }

   #[must_use]
   pub fn with_name(mut self, name: impl Into<SmolStr>) -> Self {
      self.name = Some(name.into());
      self
   }

   #[must_use]
   pub fn with_class(mut self, class: ClassCode) -> Self {
      self.class = Some(class);
      self
   }

   /// Resolves the identity reported for this device.
   pub fn identity(&self) -> DeviceIdentity {
      let name = self.name.as_deref();
      DeviceIdentity::new(name, self.address.clone(), classify::classify(self.class, name))
   }

   pub fn is_builtin(&self) -> bool {
      self.class.is_some_and(ClassCode::is_builtin)
   }
}

/// A notification as delivered by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawNotification {
   AdapterState(AdapterCode),
   DeviceConnected(RawDevice),
   DeviceDisconnected(RawDevice),
}

/// Stable identifier for an audio port: its uid, or the port name when the
/// platform has no uid for it.
pub fn port_address(uid: Option<&str>, port_name: &str) -> SmolStr {
   match uid {
      Some(uid) if !uid.is_empty() => uid.into(),
      _ => port_name.into(),
   }
}

#[derive(Debug, Default)]
pub struct Normalizer {
   last_state: Option<AdapterState>,
   attach_adapter_state: bool,
}

impl Normalizer {
   pub fn new() -> Self {
      Self::default()
   }

   /// Attach the last known adapter state to device events.
   #[must_use]
   pub const fn with_adapter_state(mut self, attach: bool) -> Self {
      self.attach_adapter_state = attach;
      self
   }

   /// Last adapter state observed, if any.
   pub const fn adapter_state(&self) -> Option<AdapterState> {
      self.last_state
   }

   /// Normalizes one notification. Returns `None` when nothing should be
   /// emitted (unchanged adapter state, built-in audio endpoint).
   pub fn normalize(&mut self, raw: RawNotification) -> Option<ConnectionEvent> {
      match raw {
         RawNotification::AdapterState(code) => self.adapter_changed(&code),
         RawNotification::DeviceConnected(device) => {
            let device = Self::external_device(&device)?;
            debug!("Device connected: {} ({})", device.name, device.address);
            Some(ConnectionEvent::Connected {
               device,
               adapter_state: self.attached_state(),
            })
         },
         RawNotification::DeviceDisconnected(device) => {
            let device = Self::external_device(&device)?;
            debug!("Device disconnected: {} ({})", device.name, device.address);
            Some(ConnectionEvent::Disconnected {
               device,
               adapter_state: self.attached_state(),
            })
         },
      }
   }

   fn adapter_changed(&mut self, code: &AdapterCode) -> Option<ConnectionEvent> {
      let state = AdapterState::from(code);
      if self.last_state == Some(state) {
         return None;
      }
      debug!("Adapter state {:?} -> {state} ({code:?})", self.last_state);
      self.last_state = Some(state);
      Some(ConnectionEvent::AdapterStateChanged { state })
   }

   fn external_device(device: &RawDevice) -> Option<DeviceIdentity> {
      if device.is_builtin() {
         debug!("Ignoring built-in endpoint {}", device.address);
         return None;
      }
      Some(device.identity())
   }

   fn attached_state(&self) -> Option<AdapterState> {
      self.last_state.filter(|_| self.attach_adapter_state)
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::{
      device::classify::{DeviceType, PortType},
      event::{
         BATTERY_LEVEL_UNKNOWN, EVENT_STATE_CHANGED, EventKind, SIGNAL_STRENGTH_PLACEHOLDER,
         UNKNOWN_DEVICE_NAME,
      },
   };

   const ADDR: &str = "AA:BB:CC:DD:EE:FF";

   #[test]
   fn test_duplicate_adapter_state_emits_once() {
      let mut normalizer = Normalizer::new();
      let raw = RawNotification::AdapterState(AdapterCode::Android(12));

      let first = normalizer.normalize(raw.clone());
      assert_eq!(
         first,
         Some(ConnectionEvent::AdapterStateChanged {
            state: AdapterState::On
         })
      );
      assert_eq!(normalizer.normalize(raw), None);
      assert_eq!(normalizer.adapter_state(), Some(AdapterState::On));
   }

   #[test]
   fn test_equivalent_codes_are_duplicates() {
      let mut normalizer = Normalizer::new();
      assert!(
         normalizer
            .normalize(RawNotification::AdapterState(AdapterCode::Powered(true)))
            .is_some()
      );
      assert!(
         normalizer
            .normalize(RawNotification::AdapterState(AdapterCode::PowerState(
               "on".into()
            )))
            .is_none()
      );
   }

   #[test]
   fn test_transitions_emit() {
      let mut normalizer = Normalizer::new();
      let names: Vec<_> = [12, 13, 10, 10, 11, 12]
         .into_iter()
         .filter_map(|code| normalizer.normalize(RawNotification::AdapterState(AdapterCode::Android(code))))
         .map(|event| event.event_name())
         .collect();
      assert_eq!(
         names,
         [
            "BLUETOOTH_ON",
            "BLUETOOTH_TURNING_OFF",
            "BLUETOOTH_OFF",
            "BLUETOOTH_TURNING_ON",
            "BLUETOOTH_ON"
         ]
      );
   }

   #[test]
   fn test_unrecognized_state_first_occurrence() {
      let mut normalizer = Normalizer::new();
      let raw = RawNotification::AdapterState(AdapterCode::Android(-1));
      let event = normalizer.normalize(raw.clone()).expect("event was dropped");
      assert_eq!(event.kind(), EventKind::AdapterStateChanged);
      assert_eq!(event.adapter_state(), Some(AdapterState::Unknown));
      assert_eq!(event.event_name(), EVENT_STATE_CHANGED);
      assert!(normalizer.normalize(raw).is_none());
   }

   #[test]
   fn test_connected_without_name() {
      let mut normalizer = Normalizer::new();
      let event = normalizer
         .normalize(RawNotification::DeviceConnected(RawDevice::new(ADDR)))
         .unwrap();

      let device = event.device().unwrap();
      assert_eq!(device.name, UNKNOWN_DEVICE_NAME);
      assert_eq!(device.address, ADDR);
      assert_eq!(device.device_type, DeviceType::Unknown);
      assert_eq!(event.signal_strength(), Some(SIGNAL_STRENGTH_PLACEHOLDER));
      assert_eq!(event.battery_level(), Some(BATTERY_LEVEL_UNKNOWN));
      assert_eq!(event.adapter_state(), None);
   }

   #[test]
   fn test_connect_disconnect_not_deduplicated() {
      let mut normalizer = Normalizer::new();
      let device = RawDevice::new(ADDR)
         .with_name("WH-1000XM4")
         .with_class(ClassCode::Device(0x24_0404));

      for _ in 0..2 {
         let event = normalizer
            .normalize(RawNotification::DeviceConnected(device.clone()))
            .unwrap();
         assert_eq!(event.kind(), EventKind::Connected);
         assert_eq!(event.device().unwrap().device_type, DeviceType::Headset);
      }
      for _ in 0..2 {
         let event = normalizer
            .normalize(RawNotification::DeviceDisconnected(device.clone()))
            .unwrap();
         assert_eq!(event.kind(), EventKind::Disconnected);
         assert_eq!(event.signal_strength(), None);
         assert_eq!(event.battery_level(), None);
      }
   }

   #[test]
   fn test_builtin_ports_dropped() {
      let mut normalizer = Normalizer::new();
      for port in [PortType::BuiltInSpeaker, PortType::BuiltInReceiver] {
         let device = RawDevice::new("Speaker")
            .with_name("Speaker")
            .with_class(ClassCode::Port(port));
         assert!(
            normalizer
               .normalize(RawNotification::DeviceConnected(device.clone()))
               .is_none()
         );
         assert!(
            normalizer
               .normalize(RawNotification::DeviceDisconnected(device))
               .is_none()
         );
      }
   }

   #[test]
   fn test_attached_adapter_state() {
      let mut normalizer = Normalizer::new().with_adapter_state(true);
      let device = RawDevice::new(ADDR).with_name("Car Kit");

      // Nothing cached yet
      let event = normalizer
         .normalize(RawNotification::DeviceConnected(device.clone()))
         .unwrap();
      assert_eq!(event.adapter_state(), None);

      normalizer.normalize(RawNotification::AdapterState(AdapterCode::Powered(true)));
      let event = normalizer
         .normalize(RawNotification::DeviceDisconnected(device))
         .unwrap();
      assert_eq!(event.adapter_state(), Some(AdapterState::On));
      assert_eq!(event.device().unwrap().device_type, DeviceType::CarAudio);
   }

   #[test]
   fn test_port_address() {
      assert_eq!(port_address(Some("00:11:22:33:44:55-tacl"), "AirPods"), "00:11:22:33:44:55-tacl");
      assert_eq!(port_address(None, "AirPods"), "AirPods");
      assert_eq!(port_address(Some(""), "CarPlay"), "CarPlay");
   }
}
