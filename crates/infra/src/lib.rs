//! Linux implementations of the sndplug collaborators
//!
//! - `alsa`: device node watcher and procfs card metadata
//! - `usb`: USB hotplug monitor over nusb
//! - `broadcast`: notification sink over a tokio broadcast channel
//! - `midi`: MIDI binder forwarding over a crossbeam channel

pub mod alsa;
pub mod broadcast;
pub mod midi;
pub mod usb;

pub use alsa::{NodeWatcher, ProcfsMetadata, WatcherError};
pub use broadcast::BroadcastSink;
pub use midi::{ChannelMidiBinder, MidiEvent};
pub use usb::{UsbEvent, UsbMonitor, UsbWatchError};
