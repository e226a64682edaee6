//! BlueZ connection monitor.
//!
//! An actor owns the adapter, the per-device watchers and the
//! [`Normalizer`]. Watchers only translate BlueZ property changes into
//! [`RawNotification`]s and forward them to the actor, so normalization
//! happens on a single queue.

use std::{collections::HashMap, pin::pin, time::Duration};

use bluer::{Adapter, AdapterEvent, AdapterProperty, Address, DeviceEvent, DeviceProperty, Session};
use futures::stream::StreamExt;
use log::{debug, info, warn};
use rand::Rng;
use smol_str::SmolStr;
use tokio::{
   select,
   sync::{mpsc, oneshot},
   task::JoinHandle,
   time::{self, MissedTickBehavior},
};

use crate::{
   bluetooth::profiles,
   commands::DeviceSource,
   config::Config,
   device::adapter::{AdapterCode, AdapterState},
   error::{MonitorError, Result},
   event::EventSender,
   normalizer::{Normalizer, RawDevice, RawNotification},
   snapshot::{self, RouteEntry},
};

/// Base delay before re-acquiring a lost adapter
const ADAPTER_RECOVERY_DELAY: Duration = Duration::from_secs(2);
/// Upper bound for the adapter recovery back-off
const MAX_RECOVERY_DELAY: Duration = Duration::from_secs(120);
/// Channel buffer size
const CHANNEL_BUFFER_SIZE: usize = 256;

#[derive(Debug)]
enum MonitorCommand {
   // Adapter events
   AdapterAvailable(Adapter),
   AdapterLost,
   AdapterRecoveryFailed(String),

   // Device events
   DeviceAdded(Address),
   DeviceRemoved(Address),
   Notification(RawNotification),
   Announce,

   // Queries
   GetAdapterState(oneshot::Sender<AdapterState>),
   GetDevices(oneshot::Sender<Result<Vec<RouteEntry>>>),
}

/// Handle to the monitor actor.
pub struct BluetoothMonitor {
   inbox: mpsc::Sender<MonitorCommand>,
}

impl BluetoothMonitor {
   pub async fn new(config: Config, events: EventSender) -> Result<Self> {
      let session = Session::new().await?;
      let (command_tx, command_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
      tokio::spawn(MonitorActor::new(config, events, session, command_rx).run());
      Ok(Self { inbox: command_tx })
   }

   /// Asks the actor to emit `CONNECTED` for every device that is already
   /// connected, if `announce_on_start` is enabled.
   pub async fn announce(&self) {
      if self.inbox.send(MonitorCommand::Announce).await.is_err() {
         debug!("Monitor is gone, nothing to announce");
      }
   }
}

impl DeviceSource for BluetoothMonitor {
   async fn adapter_state(&self) -> AdapterState {
      let (tx, rx) = oneshot::channel();
      if self
         .inbox
         .send(MonitorCommand::GetAdapterState(tx))
         .await
         .is_err()
      {
         return AdapterState::Unknown;
      }
      rx.await.unwrap_or(AdapterState::Unknown)
   }

   async fn devices(&self) -> Result<Vec<RouteEntry>> {
      let (tx, rx) = oneshot::channel();
      self
         .inbox
         .send(MonitorCommand::GetDevices(tx))
         .await
         .map_err(|_| MonitorError::MonitorShutdown)?;
      rx.await.map_err(|_| MonitorError::MonitorShutdown)?
   }
}

struct MonitorActor {
   config: Config,
   events: EventSender,
   normalizer: Normalizer,
   session: Session,
   command_rx: mpsc::Receiver<MonitorCommand>,
   loopback_rx: mpsc::Receiver<MonitorCommand>,
   loopback_tx: mpsc::Sender<MonitorCommand>,

   adapter: Option<Adapter>,
   adapter_monitor: Option<JoinHandle<()>>,
   watchers: HashMap<Address, JoinHandle<()>>,
   retry_count: u32,
}

impl MonitorActor {
   fn new(
      config: Config,
      events: EventSender,
      session: Session,
      command_rx: mpsc::Receiver<MonitorCommand>,
   ) -> Self {
      let (loopback_tx, loopback_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
      let normalizer = Normalizer::new().with_adapter_state(config.attach_adapter_state);
      Self {
         config,
         events,
         normalizer,
         session,
         command_rx,
         loopback_rx,
         loopback_tx,
         adapter: None,
         adapter_monitor: None,
         watchers: HashMap::new(),
         retry_count: 0,
      }
   }

   async fn run(mut self) {
      info!("Bluetooth monitor starting up");

      match self.open_adapter().await {
         Ok(adapter) => self.attach_adapter(adapter).await,
         Err(e) => {
            warn!("No Bluetooth adapter available: {e}");
            self.process(RawNotification::AdapterState(AdapterCode::Missing));
            self.schedule_recovery();
         },
      }

      // Powered changes normally arrive as property events; the poll only
      // catches what was missed. Unchanged states are swallowed by the
      // normalizer.
      let mut poll_interval = time::interval(Duration::from_secs(self.config.poll_interval.max(1)));
      poll_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

      loop {
         select! {
             _ = poll_interval.tick() => {
                 self.poll_adapter_state().await;
             }
             cmd = self.command_rx.recv() => {
                 let Some(cmd) = cmd else {
                     info!("Bluetooth monitor shutting down");
                     break;
                 };
                 self.handle_command(cmd).await;
             }
             Some(cmd) = self.loopback_rx.recv() => {
                 self.handle_command(cmd).await;
             }
         }
      }

      self.cleanup();
   }

   async fn open_adapter(&self) -> Result<Adapter> {
      match &self.config.adapter {
         Some(name) => Ok(self.session.adapter(name)?),
         None => Ok(self.session.default_adapter().await?),
      }
   }

   async fn attach_adapter(&mut self, adapter: Adapter) {
      info!("Monitoring adapter: {}", adapter.name());
      self.retry_count = 0;

      if let Some(handle) = self.adapter_monitor.take() {
         handle.abort();
      }
      self.adapter_monitor = Some(Self::start_adapter_monitor(
         self.loopback_tx.clone(),
         adapter.clone(),
      ));

      match adapter.is_powered().await {
         Ok(powered) => self.process(RawNotification::AdapterState(AdapterCode::Powered(powered))),
         Err(e) => warn!("Failed to read adapter power state: {e}"),
      }

      match adapter.device_addresses().await {
         Ok(addresses) => {
            for addr in addresses {
               self.watch_device(&adapter, addr);
            }
         },
         Err(e) => warn!("Failed to list devices on {}: {e}", adapter.name()),
      }

      self.adapter = Some(adapter);

      // Only reaches a subscriber that is already listening; a later
      // `Listen` triggers its own announcement.
      self.announce_connected().await;
   }

   fn start_adapter_monitor(
      loopback: mpsc::Sender<MonitorCommand>,
      adapter: Adapter,
   ) -> JoinHandle<()> {
      tokio::spawn(async move {
         let name = SmolStr::from(adapter.name());
         let Ok(events) = adapter.events().await else {
            warn!("Failed to get adapter events for {name}");
            let _ = loopback.send(MonitorCommand::AdapterLost).await;
            return;
         };
         let mut events = pin!(events);

         while let Some(event) = events.next().await {
            let cmd = match event {
               AdapterEvent::DeviceAdded(addr) => {
                  debug!("Device added on {name}: {addr}");
                  MonitorCommand::DeviceAdded(addr)
               },
               AdapterEvent::DeviceRemoved(addr) => {
                  debug!("Device removed on {name}: {addr}");
                  MonitorCommand::DeviceRemoved(addr)
               },
               AdapterEvent::PropertyChanged(AdapterProperty::Powered(powered)) => {
                  MonitorCommand::Notification(RawNotification::AdapterState(
                     AdapterCode::Powered(powered),
                  ))
               },
               _ => continue,
            };
            if loopback.send(cmd).await.is_err() {
               return;
            }
         }

         // Event stream ended: the adapter is gone
         let _ = loopback.send(MonitorCommand::AdapterLost).await;
      })
   }

   fn watch_device(&mut self, adapter: &Adapter, addr: Address) {
      if self.watchers.contains_key(&addr) {
         return;
      }
      let Ok(device) = adapter.device(addr) else {
         return;
      };

      let loopback = self.loopback_tx.clone();
      let handle = tokio::spawn(async move {
         let Ok(events) = device.events().await else {
            warn!("Failed to get device events for {addr}");
            return;
         };
         let mut events = pin!(events);

         while let Some(event) = events.next().await {
            let DeviceEvent::PropertyChanged(DeviceProperty::Connected(connected)) = event else {
               continue;
            };
            let raw = raw_device(&device).await;
            let notification = if connected {
               RawNotification::DeviceConnected(raw)
            } else {
               RawNotification::DeviceDisconnected(raw)
            };
            if loopback
               .send(MonitorCommand::Notification(notification))
               .await
               .is_err()
            {
               return;
            }
         }
      });
      self.watchers.insert(addr, handle);
   }

   async fn announce_connected(&mut self) {
      if !self.config.announce_on_start || self.adapter.is_none() {
         return;
      }
      match self.list_devices().await {
         Ok(entries) => {
            for raw in snapshot::announcements(entries) {
               self.process(raw);
            }
         },
         Err(e) => debug!("Nothing to announce: {e}"),
      }
   }

   fn process(&mut self, raw: RawNotification) {
      if let Some(event) = self.normalizer.normalize(raw) {
         self.events.emit(&event);
      }
   }

   async fn handle_command(&mut self, cmd: MonitorCommand) {
      match cmd {
         MonitorCommand::AdapterAvailable(adapter) => {
            self.attach_adapter(adapter).await;
         },
         MonitorCommand::AdapterLost => {
            self.handle_adapter_lost();
         },
         MonitorCommand::AdapterRecoveryFailed(error) => {
            debug!("Adapter recovery failed: {error}");
            self.schedule_recovery();
         },
         MonitorCommand::DeviceAdded(addr) => {
            if let Some(adapter) = self.adapter.clone() {
               self.watch_device(&adapter, addr);
            }
         },
         MonitorCommand::DeviceRemoved(addr) => {
            if let Some(handle) = self.watchers.remove(&addr) {
               handle.abort();
            }
         },
         MonitorCommand::Notification(raw) => {
            self.process(raw);
         },
         MonitorCommand::Announce => {
            self.announce_connected().await;
         },
         MonitorCommand::GetAdapterState(reply) => {
            let _ = reply.send(self.read_adapter_state().await);
         },
         MonitorCommand::GetDevices(reply) => {
            let _ = reply.send(self.list_devices().await);
         },
      }
   }

   fn handle_adapter_lost(&mut self) {
      if self.adapter.take().is_none() {
         return;
      }
      warn!("Adapter lost");

      if let Some(handle) = self.adapter_monitor.take() {
         handle.abort();
      }
      for (_, handle) in self.watchers.drain() {
         handle.abort();
      }

      self.process(RawNotification::AdapterState(AdapterCode::Missing));
      self.schedule_recovery();
   }

   fn schedule_recovery(&mut self) {
      self.retry_count += 1;
      let delay = calc_retry_delay(self.retry_count);
      info!("Retrying adapter in {delay:?}");

      let loopback = self.loopback_tx.clone();
      let session = self.session.clone();
      let name = self.config.adapter.clone();

      tokio::spawn(async move {
         time::sleep(delay).await;

         let adapter = match &name {
            Some(name) => session.adapter(name),
            None => session.default_adapter().await,
         };
         let cmd = match adapter {
            Ok(adapter) => MonitorCommand::AdapterAvailable(adapter),
            Err(e) => MonitorCommand::AdapterRecoveryFailed(e.to_string()),
         };
         let _ = loopback.send(cmd).await;
      });
   }

   async fn poll_adapter_state(&mut self) {
      let Some(adapter) = self.adapter.clone() else {
         return;
      };
      match adapter.is_powered().await {
         Ok(powered) => self.process(RawNotification::AdapterState(AdapterCode::Powered(powered))),
         Err(e) => debug!("Adapter poll failed: {e}"),
      }
   }

   async fn read_adapter_state(&self) -> AdapterState {
      let Some(adapter) = &self.adapter else {
         return AdapterState::Unsupported;
      };
      match adapter.is_powered().await {
         Ok(powered) => AdapterState::from(&AdapterCode::Powered(powered)),
         Err(e) => {
            warn!("Failed to read adapter state: {e}");
            AdapterState::Unknown
         },
      }
   }

   async fn list_devices(&self) -> Result<Vec<RouteEntry>> {
      let adapter = self.adapter.as_ref().ok_or(MonitorError::AdapterNotFound)?;

      let mut entries = Vec::new();
      for addr in adapter.device_addresses().await? {
         let Ok(device) = adapter.device(addr) else {
            continue;
         };
         entries.push(RouteEntry {
            connected: device.is_connected().await.unwrap_or(false),
            bonded: device.is_paired().await.unwrap_or(false),
            device: raw_device(&device).await,
         });
      }
      Ok(entries)
   }

   fn cleanup(&mut self) {
      info!("Cleaning up Bluetooth monitor");
      if let Some(handle) = self.adapter_monitor.take() {
         handle.abort();
      }
      for (_, handle) in self.watchers.drain() {
         handle.abort();
      }
   }
}

/// Reads what a notification needs to know about a BlueZ device.
async fn raw_device(device: &bluer::Device) -> RawDevice {
   let class = device.class().await.ok().flatten();
   let uuids = device.uuids().await.ok().flatten();
   let name = match device.name().await {
      Ok(Some(name)) => Some(name),
      // The alias falls back to the address; only use it if set explicitly
      _ => device
         .alias()
         .await
         .ok()
         .filter(|alias| *alias != device.address().to_string()),
   };

   RawDevice {
      name: name.map(SmolStr::from),
      address: SmolStr::from(device.address().to_string()),
      class: profiles::class_code(class, uuids.as_ref()),
   }
}

fn calc_retry_delay(retry_count: u32) -> Duration {
   let exponential = ADAPTER_RECOVERY_DELAY * (1 << retry_count.min(6));
   let delay = exponential.min(MAX_RECOVERY_DELAY);
   let jitter = rand::thread_rng().gen_range(0..1000);
   delay + Duration::from_millis(jitter)
}
