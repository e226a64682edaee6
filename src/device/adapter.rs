//! Adapter (radio) state mapping.

use serde::Serialize;
use smol_str::SmolStr;

/// Power/availability state of the Bluetooth adapter.
#[derive(
   Debug,
   Clone,
   Copy,
   PartialEq,
   Eq,
   Hash,
   Serialize,
   strum::Display,
   strum::EnumString,
   strum::IntoStaticStr,
)]
#[serde(into = "&'static str")]
pub enum AdapterState {
   #[strum(serialize = "BLUETOOTH_ON")]
   On,
   #[strum(serialize = "BLUETOOTH_OFF")]
   Off,
   #[strum(serialize = "BLUETOOTH_TURNING_ON")]
   TurningOn,
   #[strum(serialize = "BLUETOOTH_TURNING_OFF")]
   TurningOff,
   #[strum(serialize = "BLUETOOTH_UNAUTHORIZED")]
   Unauthorized,
   #[strum(serialize = "BLUETOOTH_UNSUPPORTED")]
   Unsupported,
   #[strum(serialize = "BLUETOOTH_RESETTING")]
   Resetting,
   #[strum(serialize = "BLUETOOTH_UNKNOWN")]
   Unknown,
}

impl AdapterState {
   pub fn to_str(self) -> &'static str {
      self.into()
   }

   /// Whether this is one of the four power states that get their own
   /// event name on the stream.
   pub const fn is_power_state(self) -> bool {
      matches!(
         self,
         Self::On | Self::Off | Self::TurningOn | Self::TurningOff
      )
   }
}

// android.bluetooth.BluetoothAdapter.STATE_*
pub const ANDROID_STATE_OFF: i32 = 10;
pub const ANDROID_STATE_TURNING_ON: i32 = 11;
pub const ANDROID_STATE_ON: i32 = 12;
pub const ANDROID_STATE_TURNING_OFF: i32 = 13;

// CBManagerState raw values (0 is unknown)
pub const CB_STATE_RESETTING: i64 = 1;
pub const CB_STATE_UNSUPPORTED: i64 = 2;
pub const CB_STATE_UNAUTHORIZED: i64 = 3;
pub const CB_STATE_POWERED_OFF: i64 = 4;
pub const CB_STATE_POWERED_ON: i64 = 5;

/// Raw adapter state as delivered by a platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterCode {
   /// `BluetoothAdapter.EXTRA_STATE` value.
   Android(i32),
   /// `CBManagerState` raw value.
   CoreBluetooth(i64),
   /// BlueZ `org.bluez.Adapter1.Powered`.
   Powered(bool),
   /// BlueZ `org.bluez.Adapter1.PowerState`.
   PowerState(SmolStr),
   /// No adapter present.
   Missing,
}

impl From<&AdapterCode> for AdapterState {
   fn from(code: &AdapterCode) -> Self {
      match code {
         AdapterCode::Android(code) => match *code {
            ANDROID_STATE_OFF => Self::Off,
            ANDROID_STATE_TURNING_ON => Self::TurningOn,
            ANDROID_STATE_ON => Self::On,
            ANDROID_STATE_TURNING_OFF => Self::TurningOff,
            _ => Self::Unknown,
         },
         AdapterCode::CoreBluetooth(code) => match *code {
            CB_STATE_RESETTING => Self::Resetting,
            CB_STATE_UNSUPPORTED => Self::Unsupported,
            CB_STATE_UNAUTHORIZED => Self::Unauthorized,
            CB_STATE_POWERED_OFF => Self::Off,
            CB_STATE_POWERED_ON => Self::On,
            _ => Self::Unknown,
         },
         AdapterCode::Powered(true) => Self::On,
         AdapterCode::Powered(false) => Self::Off,
         AdapterCode::PowerState(state) => match state.as_str() {
            "on" => Self::On,
            "off" => Self::Off,
            "off-enabling" => Self::TurningOn,
            "on-disabling" => Self::TurningOff,
            "off-blocked" => Self::Unauthorized,
            _ => Self::Unknown,
         },
         AdapterCode::Missing => Self::Unsupported,
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   fn state(code: AdapterCode) -> AdapterState {
      AdapterState::from(&code)
   }

   #[test]
   fn test_android_codes() {
      assert_eq!(state(AdapterCode::Android(10)), AdapterState::Off);
      assert_eq!(state(AdapterCode::Android(11)), AdapterState::TurningOn);
      assert_eq!(state(AdapterCode::Android(12)), AdapterState::On);
      assert_eq!(state(AdapterCode::Android(13)), AdapterState::TurningOff);
      // BluetoothAdapter.ERROR
      assert_eq!(state(AdapterCode::Android(i32::MIN)), AdapterState::Unknown);
      assert_eq!(state(AdapterCode::Android(14)), AdapterState::Unknown);
   }

   #[test]
   fn test_core_bluetooth_codes() {
      let expected = [
         AdapterState::Unknown,
         AdapterState::Resetting,
         AdapterState::Unsupported,
         AdapterState::Unauthorized,
         AdapterState::Off,
         AdapterState::On,
      ];
      for (raw, want) in expected.into_iter().enumerate() {
         assert_eq!(state(AdapterCode::CoreBluetooth(raw as i64)), want);
      }
      assert_eq!(state(AdapterCode::CoreBluetooth(42)), AdapterState::Unknown);
   }

   #[test]
   fn test_bluez_codes() {
      assert_eq!(state(AdapterCode::Powered(true)), AdapterState::On);
      assert_eq!(state(AdapterCode::Powered(false)), AdapterState::Off);
      assert_eq!(
         state(AdapterCode::PowerState("off-enabling".into())),
         AdapterState::TurningOn
      );
      assert_eq!(
         state(AdapterCode::PowerState("on-disabling".into())),
         AdapterState::TurningOff
      );
      assert_eq!(
         state(AdapterCode::PowerState("exploding".into())),
         AdapterState::Unknown
      );
      assert_eq!(state(AdapterCode::Missing), AdapterState::Unsupported);
   }

   #[test]
   fn test_wire_names() {
      assert_eq!(AdapterState::On.to_str(), "BLUETOOTH_ON");
      assert_eq!(AdapterState::Unknown.to_string(), "BLUETOOTH_UNKNOWN");
      assert_eq!(
         "BLUETOOTH_RESETTING".parse::<AdapterState>().unwrap(),
         AdapterState::Resetting
      );
      assert!(AdapterState::TurningOff.is_power_state());
      assert!(!AdapterState::Resetting.is_power_state());
   }
}
