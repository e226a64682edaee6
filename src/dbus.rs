//! D-Bus surface of the monitor: the command interface and the event stream.
//!
//! Stream events are carried by the `ConnectionEvent` signal as JSON records.
//! Only one listener is served at a time; `Listen` replaces the previous one.

use std::sync::Arc;

use log::info;
use serde_json::Value;
use zbus::{interface, object_server::SignalEmitter};

use crate::{
   bluetooth::monitor::BluetoothMonitor,
   commands::{self, Command},
   dispatcher::EventProcessor,
   event::StreamHandler,
   snapshot::SnapshotMode,
};

pub const SERVICE_NAME: &str = "org.btmonitor";
pub const OBJECT_PATH: &str = "/org/btmonitor/monitor";

pub struct MonitorService {
   monitor: BluetoothMonitor,
   stream: Arc<StreamHandler>,
   dispatcher: Arc<EventProcessor>,
   snapshot_mode: SnapshotMode,
}

impl MonitorService {
   pub const fn new(
      monitor: BluetoothMonitor,
      stream: Arc<StreamHandler>,
      dispatcher: Arc<EventProcessor>,
      snapshot_mode: SnapshotMode,
   ) -> Self {
      Self {
         monitor,
         stream,
         dispatcher,
         snapshot_mode,
      }
   }

   async fn call(&self, method: &str, args: &Value) -> zbus::fdo::Result<Value> {
      commands::handle_command(&self.monitor, self.snapshot_mode, method, args)
         .await
         .to_json()
         .ok_or_else(|| zbus::fdo::Error::NotSupported(format!("Method not implemented: {method}")))
   }

   async fn call_bool(&self, command: Command, address: String) -> zbus::fdo::Result<bool> {
      let args = serde_json::json!({ "address": address });
      let result = self.call(&command.to_string(), &args).await?;
      Ok(result.as_bool().unwrap_or(false))
   }
}

#[interface(name = "org.btmonitor.Monitor")]
impl MonitorService {
   /// Generic command entry point: `method` plus JSON arguments, JSON result.
   async fn invoke(&self, method: String, args: String) -> zbus::fdo::Result<String> {
      let args = if args.trim().is_empty() {
         Value::Null
      } else {
         serde_json::from_str(&args).map_err(|e| zbus::fdo::Error::InvalidArgs(e.to_string()))?
      };
      Ok(self.call(&method, &args).await?.to_string())
   }

   async fn get_bluetooth_state(&self) -> zbus::fdo::Result<String> {
      let state = self
         .call(&Command::GetBluetoothState.to_string(), &Value::Null)
         .await?;
      Ok(state.as_str().unwrap_or_default().to_owned())
   }

   async fn get_connected_devices(&self) -> zbus::fdo::Result<String> {
      let devices = self
         .call(&Command::GetConnectedDevices.to_string(), &Value::Null)
         .await?;
      Ok(devices.to_string())
   }

   async fn get_currently_connected_devices(&self) -> zbus::fdo::Result<String> {
      self.get_connected_devices().await
   }

   async fn connect_device(&self, address: String) -> zbus::fdo::Result<bool> {
      self.call_bool(Command::ConnectDevice, address).await
   }

   async fn disconnect_device(&self, address: String) -> zbus::fdo::Result<bool> {
      self.call_bool(Command::DisconnectDevice, address).await
   }

   /// Subscribes to the event stream, replacing any previous subscriber.
   /// Devices that are already connected are announced right after.
   async fn listen(
      &self,
      #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
   ) -> zbus::fdo::Result<()> {
      self.dispatcher.reset();
      self.stream.listen(self.dispatcher.clone());
      info!("Event stream listener attached");
      self.monitor.announce().await;
      self.listening_changed(&emitter).await?;
      Ok(())
   }

   async fn cancel(
      &self,
      #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
   ) -> zbus::fdo::Result<()> {
      if self.stream.cancel() {
         // Whatever is still queued belonged to the listener that just left
         self.dispatcher.reset();
         info!("Event stream listener detached");
         self.listening_changed(&emitter).await?;
      }
      Ok(())
   }

   // Signals
   #[zbus(signal)]
   pub async fn connection_event(emitter: &SignalEmitter<'_>, event: &str) -> zbus::Result<()>;

   #[zbus(property)]
   async fn listening(&self) -> bool {
      self.stream.is_listening()
   }
}
