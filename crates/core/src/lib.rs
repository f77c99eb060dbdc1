//! sndplug core: platform-agnostic hotplug coordination for USB audio and MIDI devices
//!
//! The `domain` module holds the node registry, the card selection engine and the
//! hotplug coordinator. Linux implementations of the collaborator traits live in
//! the `sndplug-infra` crate.

pub mod domain;
