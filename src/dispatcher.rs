//! Delivery of stream events to D-Bus.
//!
//! Events are queued by the stream sink and emitted as signals from a
//! separate task, so the monitor never waits on the bus. Every queued event
//! carries the subscription generation it was published under; starting a
//! new subscription discards whatever is still queued for the old one.

use std::{
   sync::{
      Arc,
      atomic::{AtomicU64, Ordering},
   },
   time::Duration,
};

use crossbeam::queue::SegQueue;
use log::{trace, warn};
use tokio::{sync::Notify, time};
use zbus::{Connection, object_server::InterfaceRef};

use crate::{
   dbus::{MonitorService, MonitorServiceSignals, OBJECT_PATH},
   error::Result,
   event::{ConnectionEvent, EventSink},
};

pub struct EventProcessor {
   queue: SegQueue<(u64, ConnectionEvent)>,
   generation: AtomicU64,
   notifier: Notify,
}

impl EventProcessor {
   pub fn new() -> Arc<Self> {
      Arc::new(Self {
         queue: SegQueue::new(),
         generation: AtomicU64::new(0),
         notifier: Notify::new(),
      })
   }

   /// Starts a new subscription generation and drops everything queued so far.
   pub fn reset(&self) {
      self.generation.fetch_add(1, Ordering::AcqRel);
      while let Some((_, event)) = self.queue.pop() {
         trace!("Discarding queued {}", event.event_name());
      }
   }

   /// Next event of the current generation, skipping stale ones.
   fn pop(&self) -> Option<ConnectionEvent> {
      while let Some((generation, event)) = self.queue.pop() {
         if generation == self.generation.load(Ordering::Acquire) {
            return Some(event);
         }
         trace!("Discarding {} queued for a previous listener", event.event_name());
      }
      None
   }

   async fn recv(self: &Arc<Self>) -> Option<ConnectionEvent> {
      loop {
         if let Some(event) = self.pop() {
            return Some(event);
         }
         let notify = self.notifier.notified();
         if let Some(event) = self.pop() {
            return Some(event);
         }
         if Arc::strong_count(self) == 1 {
            return None;
         }
         let _ = time::timeout(Duration::from_secs(1), notify).await;
      }
   }

   async fn dispatch(
      &self,
      iface: &InterfaceRef<MonitorService>,
      event: ConnectionEvent,
   ) -> Result<()> {
      iface.connection_event(&event.to_json().to_string()).await?;
      Ok(())
   }

   pub async fn spawn_dispatcher(self: Arc<Self>, connection: Connection) -> Result<()> {
      let iface = connection
         .object_server()
         .interface::<_, MonitorService>(OBJECT_PATH)
         .await?;
      tokio::spawn(async move {
         while let Some(event) = self.recv().await {
            if let Err(e) = self.dispatch(&iface, event).await {
               warn!("Error dispatching event: {e}");
            }
         }
      });

      Ok(())
   }
}

impl EventSink for EventProcessor {
   fn emit(&self, event: &ConnectionEvent) {
      let generation = self.generation.load(Ordering::Acquire);
      self.queue.push((generation, event.clone()));
      self.notifier.notify_waiters();
   }
}
