//! USB device identities and selected audio devices

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// USB interface class code for audio (control and streaming interfaces)
pub const USB_CLASS_AUDIO: u8 = 0x01;

/// Opaque identity of a USB device as reported by the hotplug layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UsbDeviceId(String);

impl UsbDeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UsbDeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Interface descriptor of a USB device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbInterface {
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
}

impl UsbInterface {
    pub fn new(class: u8, subclass: u8, protocol: u8) -> Self {
        Self {
            class,
            subclass,
            protocol,
        }
    }

    pub fn is_audio(&self) -> bool {
        self.class == USB_CLASS_AUDIO
    }
}

/// Device class bitset: a location bit in the low 24 bits and metadata
/// bits in the high byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceClass(u32);

impl DeviceClass {
    pub const INTERNAL: DeviceClass = DeviceClass(0x0000_0001);
    pub const EXTERNAL: DeviceClass = DeviceClass(0x0000_0002);
    pub const ALSA: DeviceClass = DeviceClass(0x8000_0000);

    const CLASS_MASK: u32 = 0x00FF_FFFF;

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: DeviceClass) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_external(&self) -> bool {
        self.0 & Self::CLASS_MASK == Self::EXTERNAL.0
    }

    /// Class of an ALSA-backed card, external when it sits on USB
    pub fn for_alsa_card(is_usb: bool) -> Self {
        let location = if is_usb { Self::EXTERNAL } else { Self::INTERNAL };
        location | Self::ALSA
    }
}

impl BitOr for DeviceClass {
    type Output = DeviceClass;

    fn bitor(self, rhs: DeviceClass) -> DeviceClass {
        DeviceClass(self.0 | rhs.0)
    }
}

/// The audio device produced by a successful card selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedDevice {
    pub card: u32,
    pub device: u32,
    pub has_playback: bool,
    pub has_capture: bool,
    pub has_midi: bool,
    pub device_class: DeviceClass,
    pub name: String,
    pub description: String,
}

impl SelectedDevice {
    pub fn has_audio(&self) -> bool {
        self.has_playback || self.has_capture
    }

    pub fn same_endpoint(&self, other: &SelectedDevice) -> bool {
        self.card == other.card && self.device == other.device
    }

    /// Notification payload announcing this device as present or gone
    pub fn notification(&self, present: bool) -> DeviceNotification {
        DeviceNotification {
            present,
            card: self.card,
            device: self.device,
            has_playback: self.has_playback,
            has_capture: self.has_capture,
            has_midi: self.has_midi,
            device_class: self.device_class,
        }
    }
}

impl fmt::Display for SelectedDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) [card: {}, device: {}, playback: {}, capture: {}, midi: {}, class: {:#010x}]",
            self.name,
            self.description,
            self.card,
            self.device,
            self.has_playback,
            self.has_capture,
            self.has_midi,
            self.device_class.bits()
        )
    }
}

/// "Device plugged"/"device unplugged" event broadcast to the audio stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceNotification {
    pub present: bool,
    pub card: u32,
    pub device: u32,
    pub has_playback: bool,
    pub has_capture: bool,
    pub has_midi: bool,
    pub device_class: DeviceClass,
}
