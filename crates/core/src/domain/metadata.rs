//! Sound card metadata as exposed by the kernel
//!
//! The [`CardMetadata`] trait is the narrow interface the selection engine
//! uses to learn which cards exist, which of them sit on USB, and which
//! streams they expose. Implementations only provide the two scans and the
//! record snapshots; every query has a default implementation on top.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::node::NodeKind;

/// Errors that can occur while scanning card metadata
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed line in {path}: {line}")]
    Malformed { path: String, line: String },
}

pub type Result<T> = std::result::Result<T, MetadataError>;

/// One sound card from the card list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRecord {
    pub card: u32,
    /// Short card identifier (`PCH`, `Device`, ...)
    pub id: String,
    pub driver: String,
    pub name: String,
    pub description: String,
    pub is_usb: bool,
}

/// One PCM or MIDI stream advertised for a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecord {
    pub card: u32,
    pub device: u32,
    pub kind: NodeKind,
}

/// Provider of card and stream metadata
pub trait CardMetadata: Send {
    /// Refresh the card list
    fn scan_cards(&mut self) -> Result<()>;

    /// Refresh the per-card stream list
    fn scan_devices(&mut self) -> Result<()>;

    /// Cards found by the last card scan, ordered by card number
    fn cards(&self) -> Vec<CardRecord>;

    /// Streams found by the last device scan
    fn streams(&self) -> Vec<StreamRecord>;

    fn card(&self, card: u32) -> Option<CardRecord> {
        self.cards().into_iter().find(|c| c.card == card)
    }

    fn is_card_usb(&self, card: u32) -> bool {
        self.card(card).map(|c| c.is_usb).unwrap_or(false)
    }

    /// The most recently enumerated USB card, if any
    fn default_usb_card(&self) -> Option<u32> {
        self.cards()
            .iter()
            .filter(|c| c.is_usb)
            .map(|c| c.card)
            .max()
    }

    /// The default USB card, falling back to the first card
    fn default_card(&self) -> Option<u32> {
        self.default_usb_card()
            .or_else(|| self.cards().iter().map(|c| c.card).min())
    }

    /// Lowest audio device number of `card`, then lowest MIDI device, else 0
    fn default_device_for(&self, card: u32) -> u32 {
        let streams = self.streams();
        let lowest = |audio: bool| {
            streams
                .iter()
                .filter(|s| s.card == card && (s.kind != NodeKind::Midi) == audio)
                .map(|s| s.device)
                .min()
        };
        lowest(true).or_else(|| lowest(false)).unwrap_or(0)
    }

    fn has_stream(&self, card: u32, kind: NodeKind) -> bool {
        self.streams()
            .iter()
            .any(|s| s.card == card && s.kind == kind)
    }

    fn has_playback(&self, card: u32) -> bool {
        self.has_stream(card, NodeKind::Playback)
    }

    fn has_capture(&self, card: u32) -> bool {
        self.has_stream(card, NodeKind::Capture)
    }

    fn has_midi(&self, card: u32) -> bool {
        self.has_stream(card, NodeKind::Midi)
    }

    fn card_name(&self, card: u32) -> String {
        self.card(card).map(|c| c.name).unwrap_or_default()
    }

    fn card_description(&self, card: u32) -> String {
        self.card(card).map(|c| c.description).unwrap_or_default()
    }

    /// Cards in the current scan that were not part of `previous`
    ///
    /// A card number reused by a different card (another id) counts as new.
    fn newly_appeared_cards(&self, previous: &[CardRecord]) -> Vec<CardRecord> {
        self.cards()
            .into_iter()
            .filter(|c| !previous.iter().any(|p| p.card == c.card && p.id == c.id))
            .collect()
    }
}
