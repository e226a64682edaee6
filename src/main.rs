//! Bluetooth connection monitor D-Bus service
//!
//! This service watches the system Bluetooth adapter and its devices,
//! normalizes adapter and connection changes into a fixed event schema,
//! and republishes them over D-Bus together with a small command interface.

use btmonitord::{
   bluetooth::monitor::BluetoothMonitor,
   config::Config,
   dbus::{MonitorService, OBJECT_PATH, SERVICE_NAME},
   dispatcher::EventProcessor,
   error::Result,
   event::StreamHandler,
};
use log::info;
use tokio::signal;
use zbus::connection;

#[tokio::main]
async fn main() -> Result<()> {
   env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

   info!("Starting Bluetooth monitor service...");

   let config = Config::load()?;
   info!(
      "Loaded configuration: adapter={}, snapshot={:?}",
      config.adapter.as_deref().unwrap_or("default"),
      config.snapshot_mode
   );

   // Event stream; the D-Bus dispatcher becomes its sink on `Listen`
   let stream = StreamHandler::new();
   let dispatcher = EventProcessor::new();

   let monitor = BluetoothMonitor::new(config.clone(), stream.clone()).await?;

   let service = MonitorService::new(
      monitor,
      stream,
      dispatcher.clone(),
      config.snapshot_mode,
   );

   let connection = connection::Builder::session()?
      .name(SERVICE_NAME)?
      .serve_at(OBJECT_PATH, service)?
      .build()
      .await?;

   info!("Bluetooth monitor service started at {SERVICE_NAME}");

   dispatcher.spawn_dispatcher(connection).await?;

   signal::ctrl_c().await?;
   info!("Shutting down Bluetooth monitor service...");

   Ok(())
}

