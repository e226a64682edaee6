//! Device type resolution.
//!
//! A structured code (Bluetooth class-of-device or audio port type) always
//! wins when it maps to a known type. Otherwise the device name is matched
//! against an ordered keyword list, and anything left over is `Unknown`.

use log::debug;
use serde::Serialize;

/// Cross-platform device category reported to consumers.
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
   strum::EnumIter,
)]
#[serde(into = "&'static str")]
pub enum DeviceType {
   Headphones,
   Speaker,
   #[strum(serialize = "Car Audio")]
   CarAudio,
   Headset,
   #[strum(serialize = "BLE Audio Device")]
   BleAudioDevice,
   Phone,
   Computer,
   Unknown,
}

impl DeviceType {
   pub fn to_str(self) -> &'static str {
      self.into()
   }
}

/// Major device class bits of a Bluetooth class-of-device.
const MAJOR_CLASS_MASK: u32 = 0x1F00;
/// Major + minor device class bits.
const DEVICE_CLASS_MASK: u32 = 0x1FFC;

/// Audio/video device classes that map onto a more precise type than the
/// major class alone.
const DEVICE_CLASSES: &[(u32, DeviceType)] = &[
   (0x0404, DeviceType::Headset),    // AUDIO_VIDEO_WEARABLE_HEADSET
   (0x0414, DeviceType::Speaker),    // AUDIO_VIDEO_LOUDSPEAKER
   (0x0418, DeviceType::Headphones), // AUDIO_VIDEO_HEADPHONES
   (0x0420, DeviceType::CarAudio),   // AUDIO_VIDEO_CAR_AUDIO
];

const MAJOR_CLASSES: &[(u32, DeviceType)] = &[
   (0x0400, DeviceType::Headphones), // AUDIO_VIDEO
   (0x0200, DeviceType::Phone),      // PHONE
   (0x0100, DeviceType::Computer),   // COMPUTER
];

/// Name keywords, checked in order; the first hit wins.
///
/// `speaker` precedes `car` so that "Car Speaker" style names report the
/// more specific output device.
const NAME_KEYWORDS: &[(&str, DeviceType)] = &[
   ("airpods", DeviceType::Headphones),
   ("headphone", DeviceType::Headphones),
   ("headset", DeviceType::Headphones),
   ("speaker", DeviceType::Speaker),
   ("car", DeviceType::CarAudio),
];

/// Audio route port types.
///
/// Parsed from the platform's raw port identifiers; anything unrecognized
/// becomes [`PortType::Other`] and falls through to name matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumString)]
pub enum PortType {
   #[strum(serialize = "BluetoothA2DPOutput")]
   BluetoothA2dp,
   #[strum(serialize = "BluetoothHFP")]
   BluetoothHfp,
   #[strum(serialize = "BluetoothLE")]
   BluetoothLe,
   #[strum(serialize = "Headphones")]
   Headphones,
   #[strum(serialize = "AirPlay")]
   AirPlay,
   #[strum(serialize = "CarAudio")]
   CarAudio,
   #[strum(serialize = "HeadsetMicrophone")]
   HeadsetMic,
   #[strum(serialize = "Speaker")]
   BuiltInSpeaker,
   #[strum(serialize = "Receiver")]
   BuiltInReceiver,
   #[strum(disabled)]
   Other,
}

impl PortType {
   pub fn from_raw(raw: &str) -> Self {
      raw.parse().unwrap_or(Self::Other)
   }

   /// Built-in endpoints are never reported as external devices.
   pub const fn is_builtin(self) -> bool {
      matches!(self, Self::BuiltInSpeaker | Self::BuiltInReceiver)
   }

   pub const fn device_type(self) -> Option<DeviceType> {
      match self {
         Self::BluetoothA2dp | Self::BluetoothHfp | Self::Headphones => {
            Some(DeviceType::Headphones)
         },
         Self::BluetoothLe => Some(DeviceType::BleAudioDevice),
         Self::AirPlay => Some(DeviceType::Speaker),
         Self::CarAudio => Some(DeviceType::CarAudio),
         Self::HeadsetMic => Some(DeviceType::Headset),
         Self::BuiltInSpeaker | Self::BuiltInReceiver | Self::Other => None,
      }
   }
}

/// Structured classification metadata attached to a device notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassCode {
   /// Bluetooth class-of-device (full 24-bit value or just the class bits).
   Device(u32),
   /// Audio route port type.
   Port(PortType),
}

impl ClassCode {
   pub fn device_type(self) -> Option<DeviceType> {
      match self {
         Self::Device(cod) => lookup(DEVICE_CLASSES, cod & DEVICE_CLASS_MASK)
            .or_else(|| lookup(MAJOR_CLASSES, cod & MAJOR_CLASS_MASK)),
         Self::Port(port) => port.device_type(),
      }
   }

   pub const fn is_builtin(self) -> bool {
      match self {
         Self::Port(port) => port.is_builtin(),
         Self::Device(_) => false,
      }
   }
}

fn lookup(table: &[(u32, DeviceType)], code: u32) -> Option<DeviceType> {
   table.iter().find(|(c, _)| *c == code).map(|&(_, ty)| ty)
}

/// Matches a device name against the keyword list (case-insensitive).
pub fn classify_name(name: &str) -> Option<DeviceType> {
   let name = name.to_lowercase();
   let (keyword, ty) = NAME_KEYWORDS.iter().find(|(kw, _)| name.contains(kw))?;
   debug!("Classified via name pattern: {name} => {keyword}");
   Some(*ty)
}

/// Resolves the device type from an optional structured code and name.
pub fn classify(code: Option<ClassCode>, name: Option<&str>) -> DeviceType {
   code
      .and_then(ClassCode::device_type)
      .or_else(|| name.and_then(classify_name))
      .unwrap_or(DeviceType::Unknown)
}
