//! USB hotplug source
//!
//! Attach and detach events come from the `nusb` hotplug watch; devices
//! present at startup are reported as attached first.

pub mod watch;

pub use watch::{DeviceTable, UsbEvent, UsbMonitor, UsbWatchError};
