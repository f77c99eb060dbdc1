//! ALSA device nodes and node-name parsing
//!
//! Device nodes appear under `/dev/snd` with names such as `pcmC1D0p`
//! (card 1, device 0, playback), `pcmC1D0c` (capture) and `midiC1D0`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use thiserror::Error;

const PCM_PREFIX: &str = "pcmC";
const MIDI_PREFIX: &str = "midiC";
const DEVICE_MARKER: char = 'D';
const PLAYBACK_MARKER: char = 'p';
const CAPTURE_MARKER: char = 'c';

/// Errors produced while parsing a node name that claims to be a stream node
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NodeParseError {
    #[error("node {name} has no device marker")]
    MissingDeviceMarker { name: String },

    #[error("node {name} has no playback/capture marker")]
    MissingStreamMarker { name: String },

    #[error("node {name} has a non-numeric {field} field")]
    InvalidNumber {
        name: String,
        field: &'static str,
        #[source]
        source: ParseIntError,
    },
}

pub type Result<T> = std::result::Result<T, NodeParseError>;

/// Kind of stream a device node carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Playback,
    Capture,
    Midi,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NodeKind::Playback => "playback",
            NodeKind::Capture => "capture",
            NodeKind::Midi => "midi",
        };
        f.write_str(label)
    }
}

/// A device node observed in the node directory
///
/// Two records are equal when they describe the same `(kind, card, device)`
/// triple, whatever their file names.
#[derive(Debug, Clone)]
pub struct DeviceNode {
    pub name: String,
    pub card: u32,
    pub device: u32,
    pub kind: NodeKind,
}

impl DeviceNode {
    pub fn new(name: impl Into<String>, kind: NodeKind, card: u32, device: u32) -> Self {
        Self {
            name: name.into(),
            card,
            device,
            kind,
        }
    }

    /// Whether this node is the `(card, device, kind)` stream being asked for
    pub fn matches(&self, card: u32, device: u32, kind: NodeKind) -> bool {
        self.kind == kind && self.card == card && self.device == device
    }
}

impl PartialEq for DeviceNode {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other.card, other.device, other.kind)
    }
}

impl Eq for DeviceNode {}

impl fmt::Display for DeviceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [card: {}, device: {}, kind: {}]",
            self.name, self.card, self.device, self.kind
        )
    }
}

/// A change observed in the node directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    Created(String),
    Deleted(String),
}

/// Parse a node name into a typed record
///
/// Returns `Ok(None)` for nodes that are not audio or MIDI streams
/// (`controlC0`, `timer`, `seq`, ...). Names that start like a stream node
/// but cannot be decoded are an error.
pub fn parse_node_name(name: &str) -> Result<Option<DeviceNode>> {
    if let Some(rest) = name.strip_prefix(PCM_PREFIX) {
        let (body, kind) = if let Some(body) = rest.strip_suffix(PLAYBACK_MARKER) {
            (body, NodeKind::Playback)
        } else if let Some(body) = rest.strip_suffix(CAPTURE_MARKER) {
            (body, NodeKind::Capture)
        } else {
            return Err(NodeParseError::MissingStreamMarker {
                name: name.to_string(),
            });
        };
        let (card, device) = parse_card_device(name, body)?;
        Ok(Some(DeviceNode::new(name, kind, card, device)))
    } else if let Some(body) = name.strip_prefix(MIDI_PREFIX) {
        let (card, device) = parse_card_device(name, body)?;
        Ok(Some(DeviceNode::new(name, NodeKind::Midi, card, device)))
    } else {
        Ok(None)
    }
}

fn parse_card_device(name: &str, body: &str) -> Result<(u32, u32)> {
    let (card, device) =
        body.split_once(DEVICE_MARKER)
            .ok_or_else(|| NodeParseError::MissingDeviceMarker {
                name: name.to_string(),
            })?;

    let card = card.parse().map_err(|source| NodeParseError::InvalidNumber {
        name: name.to_string(),
        field: "card",
        source,
    })?;
    let device = device
        .parse()
        .map_err(|source| NodeParseError::InvalidNumber {
            name: name.to_string(),
            field: "device",
            source,
        })?;

    Ok((card, device))
}
