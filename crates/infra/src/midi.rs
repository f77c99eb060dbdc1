//! MIDI binder that hands device changes to a MIDI service thread

use crossbeam::channel::{unbounded, Receiver, Sender};
use sndplug_core::domain::{BinderError, MidiBinder, UsbDeviceId};

/// Request sent to the MIDI service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiEvent {
    Added {
        card: u32,
        device: u32,
        usb_id: UsbDeviceId,
    },
    Removed {
        usb_id: UsbDeviceId,
    },
}

/// Forwards binder calls on a crossbeam channel
///
/// The call fails with [`BinderError::Unreachable`] once the receiving side
/// has been dropped.
#[derive(Debug, Clone)]
pub struct ChannelMidiBinder {
    tx: Sender<MidiEvent>,
}

impl ChannelMidiBinder {
    pub fn new() -> (Self, Receiver<MidiEvent>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }

    fn send(&self, event: MidiEvent) -> Result<(), BinderError> {
        self.tx.send(event).map_err(|_| BinderError::Unreachable)
    }
}

impl MidiBinder for ChannelMidiBinder {
    fn device_added(&self, card: u32, device: u32, usb_id: &UsbDeviceId) -> Result<(), BinderError> {
        self.send(MidiEvent::Added {
            card,
            device,
            usb_id: usb_id.clone(),
        })
    }

    fn device_removed(&self, usb_id: &UsbDeviceId) -> Result<(), BinderError> {
        self.send(MidiEvent::Removed {
            usb_id: usb_id.clone(),
        })
    }
}
