//! Card metadata read from `/proc/asound`
//!
//! `cards` lists one card per two lines:
//!
//! ```text
//!  1 [Device         ]: USB-Audio - USB Audio Device
//!                       C-Media Electronics Inc. USB Audio Device at usb-0000:00:14.0-2, full speed
//! ```
//!
//! `devices` lists one stream per line, e.g. `  4: [ 1- 0]: digital audio capture`.

use sndplug_core::domain::metadata::Result;
use sndplug_core::domain::{CardMetadata, CardRecord, MetadataError, NodeKind, StreamRecord};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

const CARDS_FILE: &str = "cards";
const DEVICES_FILE: &str = "devices";
const USB_CARD_KEY: &str = "at usb-";

/// [`CardMetadata`] backed by the ALSA procfs files
#[derive(Debug)]
pub struct ProcfsMetadata {
    proc_dir: PathBuf,
    cards: Vec<CardRecord>,
    streams: Vec<StreamRecord>,
}

impl ProcfsMetadata {
    pub fn new(proc_dir: PathBuf) -> Self {
        Self {
            proc_dir,
            cards: Vec::new(),
            streams: Vec::new(),
        }
    }

    pub fn proc_dir(&self) -> &Path {
        &self.proc_dir
    }

    fn read(&self, file: &str) -> Result<(String, String)> {
        let path = self.proc_dir.join(file);
        let display = path.display().to_string();
        let contents = std::fs::read_to_string(&path).map_err(|source| MetadataError::Io {
            path: display.clone(),
            source,
        })?;
        Ok((display, contents))
    }
}

impl CardMetadata for ProcfsMetadata {
    fn scan_cards(&mut self) -> Result<()> {
        let (path, contents) = self.read(CARDS_FILE)?;
        self.cards = parse_cards(&path, &contents)?;
        debug!(count = self.cards.len(), "Scanned ALSA cards");
        Ok(())
    }

    fn scan_devices(&mut self) -> Result<()> {
        let (_, contents) = self.read(DEVICES_FILE)?;
        self.streams = parse_devices(&contents);
        debug!(count = self.streams.len(), "Scanned ALSA devices");
        Ok(())
    }

    fn cards(&self) -> Vec<CardRecord> {
        self.cards.clone()
    }

    fn streams(&self) -> Vec<StreamRecord> {
        self.streams.clone()
    }
}

/// Parse the contents of `/proc/asound/cards`
pub fn parse_cards(path: &str, contents: &str) -> Result<Vec<CardRecord>> {
    let malformed = |line: &str| MetadataError::Malformed {
        path: path.to_string(),
        line: line.to_string(),
    };

    let mut cards = Vec::new();
    let mut lines = contents.lines().peekable();

    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();
        if !trimmed.starts_with(|c: char| c.is_ascii_digit()) {
            // "--- no soundcards ---" and stray continuation lines
            continue;
        }

        let (number, rest) = trimmed.split_once('[').ok_or_else(|| malformed(line))?;
        let card = number.trim().parse().map_err(|_| malformed(line))?;
        let (id, rest) = rest.split_once(']').ok_or_else(|| malformed(line))?;
        let rest = rest.trim_start_matches(':').trim();
        let (driver, name) = rest.split_once(" - ").unwrap_or((rest, ""));

        let description = match lines.peek() {
            Some(next) if !next.trim_start().starts_with(|c: char| c.is_ascii_digit()) => {
                let description = next.trim().to_string();
                lines.next();
                description
            }
            _ => String::new(),
        };

        cards.push(CardRecord {
            card,
            id: id.trim().to_string(),
            driver: driver.trim().to_string(),
            name: name.trim().to_string(),
            is_usb: description.contains(USB_CARD_KEY),
            description,
        });
    }

    cards.sort_by_key(|c| c.card);
    Ok(cards)
}

/// Parse the contents of `/proc/asound/devices`
///
/// Lines that are not PCM or raw MIDI streams (control, timer, sequencer)
/// are skipped.
pub fn parse_devices(contents: &str) -> Vec<StreamRecord> {
    contents.lines().filter_map(parse_device_line).collect()
}

fn parse_device_line(line: &str) -> Option<StreamRecord> {
    let (_, rest) = line.split_once('[')?;
    let (address, kind) = rest.split_once(']')?;
    let kind = match kind.trim_start_matches(':').trim() {
        "digital audio playback" => NodeKind::Playback,
        "digital audio capture" => NodeKind::Capture,
        "raw midi" => NodeKind::Midi,
        other => {
            trace!(kind = other, "Skipping ALSA device line");
            return None;
        }
    };

    let (card, device) = address.split_once('-')?;
    Some(StreamRecord {
        card: card.trim().parse().ok()?,
        device: device.trim().parse().ok()?,
        kind,
    })
}
