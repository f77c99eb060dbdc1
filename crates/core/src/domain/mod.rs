//! Domain entities and coordination rules

pub mod config;
pub mod device;
pub mod hotplug;
pub mod metadata;
pub mod node;
pub mod registry;
pub mod selection;
pub mod sink;

#[cfg(any(test, feature = "test-util"))]
pub mod fixtures;

// Re-export specific items to avoid ambiguous glob imports
pub use config::{ConfigError, ConfigManager, ReselectPolicy, SndplugConfig};
pub use device::{
    DeviceClass, DeviceNotification, SelectedDevice, UsbDeviceId, UsbInterface, USB_CLASS_AUDIO,
};
pub use hotplug::{HotplugCoordinator, HotplugState};
pub use metadata::{CardMetadata, CardRecord, MetadataError, StreamRecord};
pub use node::{parse_node_name, DeviceNode, NodeEvent, NodeKind, NodeParseError};
pub use registry::NodeRegistry;
pub use selection::{SelectionEngine, DEFAULT_NODE_TIMEOUT};
pub use sink::{BinderError, MidiBinder, NotificationSink, NotifyError};
