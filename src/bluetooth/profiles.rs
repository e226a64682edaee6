//! Audio profile detection from BlueZ service UUIDs.
//!
//! BlueZ reports the services a device advertises rather than an audio
//! route, so the profile set stands in for a port type when the
//! class-of-device is missing or uninformative.

use std::collections::HashSet;

use uuid::Uuid;

use crate::device::classify::{ClassCode, PortType};

/// LE Audio: Published Audio Capabilities / Audio Stream Control services
static LE_AUDIO_SERVICES: [Uuid; 2] = [
   Uuid::from_u128(0x00001850_0000_1000_8000_00805f9b34fb), // PACS
   Uuid::from_u128(0x0000184e_0000_1000_8000_00805f9b34fb), // ASCS
];

/// Hands-free and headset profiles
static HFP_SERVICES: [Uuid; 3] = [
   Uuid::from_u128(0x0000111e_0000_1000_8000_00805f9b34fb), // Handsfree
   Uuid::from_u128(0x00001108_0000_1000_8000_00805f9b34fb), // Headset
   Uuid::from_u128(0x00001131_0000_1000_8000_00805f9b34fb), // Headset - HS
];

/// Advanced Audio Distribution, sink role
static A2DP_SERVICES: [Uuid; 1] = [
   Uuid::from_u128(0x0000110b_0000_1000_8000_00805f9b34fb), // AudioSink
];

/// Picks the port type implied by the advertised services, if any.
pub fn port_from_services(uuids: &HashSet<Uuid>) -> Option<PortType> {
   let has = |set: &[Uuid]| set.iter().any(|u| uuids.contains(u));

   if has(&LE_AUDIO_SERVICES[..]) {
      Some(PortType::BluetoothLe)
   } else if has(&A2DP_SERVICES[..]) {
      Some(PortType::BluetoothA2dp)
   } else if has(&HFP_SERVICES[..]) {
      Some(PortType::BluetoothHfp)
   } else {
      None
   }
}

/// Chooses the structured code for a BlueZ device.
///
/// A class-of-device with a known mapping wins; otherwise the audio profile,
/// otherwise whatever class was reported (which leaves name matching to
/// decide).
pub fn class_code(class: Option<u32>, uuids: Option<&HashSet<Uuid>>) -> Option<ClassCode> {
   let class = class.map(ClassCode::Device);
   if class.and_then(ClassCode::device_type).is_some() {
      return class;
   }
   uuids
      .and_then(port_from_services)
      .map(ClassCode::Port)
      .or(class)
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::device::classify::DeviceType;

   fn uuids(services: &[Uuid]) -> HashSet<Uuid> {
      services.iter().copied().collect()
   }

   #[test]
   fn test_le_audio_preferred() {
      let set = uuids(&[A2DP_SERVICES[0], LE_AUDIO_SERVICES[1]]);
      assert_eq!(port_from_services(&set), Some(PortType::BluetoothLe));
   }

   #[test]
   fn test_classic_profiles() {
      assert_eq!(
         port_from_services(&uuids(&[HFP_SERVICES[0], A2DP_SERVICES[0]])),
         Some(PortType::BluetoothA2dp)
      );
      assert_eq!(
         port_from_services(&uuids(&[HFP_SERVICES[1]])),
         Some(PortType::BluetoothHfp)
      );
      assert_eq!(port_from_services(&HashSet::new()), None);
   }

   #[test]
   fn test_known_class_wins() {
      let set = uuids(&[LE_AUDIO_SERVICES[0]]);
      let code = class_code(Some(0x5A_020C), Some(&set));
      assert_eq!(code, Some(ClassCode::Device(0x5A_020C)));
      assert_eq!(code.and_then(ClassCode::device_type), Some(DeviceType::Phone));
   }

   #[test]
   fn test_profile_fills_unknown_class() {
      let set = uuids(&[LE_AUDIO_SERVICES[0]]);
      assert_eq!(
         class_code(Some(0x0540), Some(&set)),
         Some(ClassCode::Port(PortType::BluetoothLe))
      );
      assert_eq!(
         class_code(None, Some(&set)),
         Some(ClassCode::Port(PortType::BluetoothLe))
      );
      // Nothing better than the raw class
      assert_eq!(class_code(Some(0x0540), None), Some(ClassCode::Device(0x0540)));
      assert_eq!(class_code(None, None), None);
   }
}
