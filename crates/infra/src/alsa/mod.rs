//! ALSA integration through the kernel's filesystem interfaces
//!
//! Device nodes are watched under `/dev/snd`; card and stream metadata is
//! read from `/proc/asound`.

pub mod procfs;
pub mod watcher;

pub use procfs::ProcfsMetadata;
pub use watcher::{NodeWatcher, WatcherError};
