//! USB device hotplug through `nusb`
//!
//! nusb identifies a connected device by an opaque [`DeviceId`] and only
//! reports that id on disconnect, so the monitor remembers which
//! [`UsbDeviceId`] each id was announced under.

use futures::StreamExt;
use nusb::hotplug::HotplugEvent;
use nusb::{DeviceId, DeviceInfo};
use sndplug_core::domain::{UsbDeviceId, UsbInterface};
use std::collections::HashMap;
use std::hash::Hash;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

#[derive(Debug, Error)]
pub enum UsbWatchError {
    #[error("Failed to start USB hotplug watch: {0}")]
    Watch(#[source] nusb::Error),

    #[error("Failed to list USB devices: {0}")]
    List(#[source] nusb::Error),
}

pub type Result<T> = std::result::Result<T, UsbWatchError>;

/// A USB attach or detach
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsbEvent {
    Attached {
        id: UsbDeviceId,
        interfaces: Vec<UsbInterface>,
    },
    Detached {
        id: UsbDeviceId,
    },
}

/// Connected devices keyed by the platform handle
#[derive(Debug)]
pub struct DeviceTable<K> {
    devices: HashMap<K, UsbDeviceId>,
}

impl<K> Default for DeviceTable<K> {
    fn default() -> Self {
        Self {
            devices: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash> DeviceTable<K> {
    /// Record a connected device
    ///
    /// A key that is already known yields no event; the startup listing and
    /// the watch may both report the same device.
    pub fn connected(
        &mut self,
        key: K,
        id: UsbDeviceId,
        interfaces: Vec<UsbInterface>,
    ) -> Option<UsbEvent> {
        if self.devices.contains_key(&key) {
            return None;
        }
        self.devices.insert(key, id.clone());
        Some(UsbEvent::Attached { id, interfaces })
    }

    /// Forget a disconnected device; unknown keys yield no event
    pub fn disconnected(&mut self, key: &K) -> Option<UsbEvent> {
        self.devices
            .remove(key)
            .map(|id| UsbEvent::Detached { id })
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Identity of a device as `bus:address`, the way lsusb prints it
pub fn usb_device_id(bus: u8, address: u8) -> UsbDeviceId {
    UsbDeviceId::new(format!("{:03}:{:03}", bus, address))
}

fn interfaces(info: &DeviceInfo) -> Vec<UsbInterface> {
    info.interfaces()
        .map(|i| UsbInterface::new(i.class(), i.subclass(), i.protocol()))
        .collect()
}

#[derive(Debug, Default)]
pub struct UsbMonitor {
    devices: DeviceTable<DeviceId>,
}

impl UsbMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward hotplug events until the receiver goes away
    ///
    /// Devices already connected are sent as attaches before any live event.
    pub async fn run(mut self, tx: mpsc::Sender<UsbEvent>) -> Result<()> {
        // Subscribe before listing so a device plugged in between is not lost
        let mut watch = nusb::watch_devices().map_err(UsbWatchError::Watch)?;
        let present: Vec<DeviceInfo> = nusb::list_devices()
            .map_err(UsbWatchError::List)?
            .collect();
        info!(devices = present.len(), "USB monitor started");

        for info in &present {
            if let Some(event) = self.on_connected(info) {
                if tx.send(event).await.is_err() {
                    return Ok(());
                }
            }
        }

        while let Some(event) = watch.next().await {
            let event = match event {
                HotplugEvent::Connected(info) => self.on_connected(&info),
                HotplugEvent::Disconnected(id) => self.devices.disconnected(&id),
            };
            let Some(event) = event else {
                continue;
            };

            trace!(?event, "USB event");
            if tx.send(event).await.is_err() {
                debug!("USB event receiver closed, stopping monitor");
                return Ok(());
            }
        }

        debug!("USB hotplug watch ended");
        Ok(())
    }

    fn on_connected(&mut self, info: &DeviceInfo) -> Option<UsbEvent> {
        let id = usb_device_id(info.bus_number(), info.device_address());
        trace!(
            %id,
            vendor = format_args!("{:04x}", info.vendor_id()),
            product = format_args!("{:04x}", info.product_id()),
            "USB device connected"
        );
        self.devices.connected(info.id(), id, interfaces(info))
    }
}
