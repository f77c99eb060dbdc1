//! Device notifications over a tokio broadcast channel

use sndplug_core::domain::{DeviceNotification, NotificationSink, NotifyError};
use tokio::sync::broadcast;
use tracing::trace;

/// Broadcasts every device notification to all current subscribers
///
/// Publishing while nobody listens is not an error: the audio stack may
/// subscribe later and pick up the next change.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<DeviceNotification>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeviceNotification> {
        self.tx.subscribe()
    }
}

impl NotificationSink for BroadcastSink {
    fn publish(&self, notification: &DeviceNotification) -> Result<(), NotifyError> {
        match self.tx.send(*notification) {
            Ok(receivers) => trace!(receivers, "Device notification broadcast"),
            Err(_) => trace!("No subscriber for device notification"),
        }
        Ok(())
    }
}
