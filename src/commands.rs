//! Request/response command interface.
//!
//! Commands are addressed by name, the way UI frameworks call into native
//! plugins. Unknown names get [`CommandResponse::NotImplemented`], which is
//! distinct from a failure.

use std::future::Future;

use log::{debug, info};
use serde_json::Value;
use smol_str::SmolStr;

use crate::{
   device::adapter::AdapterState,
   error::Result,
   event::DeviceInfo,
   snapshot::{self, RouteEntry, SnapshotMode},
};

/// Where command handlers read live platform state from.
pub trait DeviceSource {
   /// Current adapter state, `Unsupported` when there is no adapter.
   fn adapter_state(&self) -> impl Future<Output = AdapterState> + Send;

   /// The platform's device/route list.
   fn devices(&self) -> impl Future<Output = Result<Vec<RouteEntry>>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
pub enum Command {
   #[strum(serialize = "getBluetoothState")]
   GetBluetoothState,
   #[strum(
      to_string = "getConnectedDevices",
      serialize = "getCurrentlyConnectedDevices"
   )]
   GetConnectedDevices,
   #[strum(serialize = "connectDevice")]
   ConnectDevice,
   #[strum(serialize = "disconnectDevice")]
   DisconnectDevice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResponse {
   State(AdapterState),
   Devices(Vec<DeviceInfo>),
   Accepted(bool),
   NotImplemented(SmolStr),
}

impl CommandResponse {
   /// Wire value of the response; `None` for [`CommandResponse::NotImplemented`].
   pub fn to_json(&self) -> Option<Value> {
      match self {
         Self::State(state) => Some(Value::from(state.to_str())),
         Self::Devices(devices) => serde_json::to_value(devices).ok(),
         Self::Accepted(accepted) => Some(Value::from(*accepted)),
         Self::NotImplemented(_) => None,
      }
   }
}

/// Programmatic connect/disconnect is not offered: platforms restrict it to
/// system UI, so both requests always report failure.
fn refuse(command: Command, args: &Value) -> CommandResponse {
   let address = args.get("address").and_then(Value::as_str).unwrap_or("-");
   info!("Refusing {command} for {address}: not supported");
   CommandResponse::Accepted(false)
}

/// Dispatches one named command.
pub async fn handle_command<S: DeviceSource>(
   source: &S,
   mode: SnapshotMode,
   method: &str,
   args: &Value,
) -> CommandResponse {
   let Ok(command) = method.parse::<Command>() else {
      debug!("Unknown command: {method}");
      return CommandResponse::NotImplemented(method.into());
   };

   match command {
      Command::GetBluetoothState => CommandResponse::State(source.adapter_state().await),
      Command::GetConnectedDevices => {
         CommandResponse::Devices(snapshot::list_or_empty(source.devices().await, mode))
      },
      Command::ConnectDevice | Command::DisconnectDevice => refuse(command, args),
   }
}
