//! Outbound collaborators: the device notification transport and the MIDI binder
//!
//! Both are external I/O with their own failure domain. Callers log failures
//! and carry on; nothing here may abort a selection.

use thiserror::Error;

use super::device::{DeviceNotification, UsbDeviceId};

/// Errors returned by a notification transport
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification transport closed")]
    Closed,

    #[error("Notification rejected: {0}")]
    Rejected(String),
}

/// Errors returned by the MIDI binder
#[derive(Debug, Error)]
pub enum BinderError {
    #[error("MIDI binder unreachable")]
    Unreachable,

    #[error("MIDI binder rejected the request: {0}")]
    Rejected(String),
}

/// Receives "device plugged"/"device unplugged" events for the audio stack
pub trait NotificationSink: Send + Sync {
    fn publish(&self, notification: &DeviceNotification) -> Result<(), NotifyError>;
}

/// Binds ALSA MIDI devices to the MIDI service
pub trait MidiBinder: Send + Sync {
    fn device_added(&self, card: u32, device: u32, usb_id: &UsbDeviceId) -> Result<(), BinderError>;

    fn device_removed(&self, usb_id: &UsbDeviceId) -> Result<(), BinderError>;
}
