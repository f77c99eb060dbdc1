//! Card selection engine
//!
//! Turns a card number into the single active [`SelectedDevice`]: checks the
//! card is USB-backed, retires whatever was selected before, waits for the
//! card's device nodes and announces the result.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use super::device::{DeviceClass, SelectedDevice};
use super::metadata::CardMetadata;
use super::node::NodeKind;
use super::registry::NodeRegistry;
use super::sink::NotificationSink;

/// Default bound on the wait for kernel node creation after a USB attach
pub const DEFAULT_NODE_TIMEOUT: Duration = Duration::from_millis(2500);

pub struct SelectionEngine {
    metadata: Box<dyn CardMetadata>,
    registry: Arc<NodeRegistry>,
    sink: Arc<dyn NotificationSink>,
    node_timeout: Duration,
    current: Option<SelectedDevice>,
}

impl SelectionEngine {
    pub fn new(
        metadata: Box<dyn CardMetadata>,
        registry: Arc<NodeRegistry>,
        sink: Arc<dyn NotificationSink>,
        node_timeout: Duration,
    ) -> Self {
        Self {
            metadata,
            registry,
            sink,
            node_timeout,
            current: None,
        }
    }

    pub fn metadata(&self) -> &dyn CardMetadata {
        self.metadata.as_ref()
    }

    pub fn metadata_mut(&mut self) -> &mut dyn CardMetadata {
        self.metadata.as_mut()
    }

    pub fn current(&self) -> Option<&SelectedDevice> {
        self.current.as_ref()
    }

    pub fn node_timeout(&self) -> Duration {
        self.node_timeout
    }

    /// Select the default device of `card`
    ///
    /// Returns `true` only when a new device was selected and announced.
    /// Selecting the card that is already active is a no-op returning `false`.
    #[instrument(skip(self))]
    pub fn select_card(&mut self, card: u32) -> bool {
        if !self.metadata.is_card_usb(card) {
            // Internal cards are routed by the audio policy layer
            debug!(card, "Not a USB card, leaving selection alone");
            return false;
        }

        if let Some(active) = &self.current {
            if active.card == card {
                debug!(card, "Card already selected");
                return false;
            }
            self.retire_current();
        }

        if let Err(e) = self.metadata.scan_devices() {
            error!(card, error = %e, "Failed to scan ALSA devices");
            return false;
        }

        let device = self.metadata.default_device_for(card);
        let has_playback = self.metadata.has_playback(card);
        let has_capture = self.metadata.has_capture(card);
        let wants_midi = self.metadata.has_midi(card);

        if has_playback && !self.wait_for(card, device, NodeKind::Playback) {
            return false;
        }
        if has_capture && !self.wait_for(card, device, NodeKind::Capture) {
            return false;
        }
        // A missing MIDI node only drops MIDI from this selection
        let has_midi = wants_midi && self.wait_for(card, device, NodeKind::Midi);

        debug!(card, device, has_playback, has_capture, has_midi, "ALSA nodes ready");

        let selected = SelectedDevice {
            card,
            device,
            has_playback,
            has_capture,
            has_midi,
            device_class: DeviceClass::for_alsa_card(self.metadata.is_card_usb(card)),
            name: self.metadata.card_name(card),
            description: self.metadata.card_description(card),
        };

        info!(device = %selected, "Selected USB audio device");
        self.announce(&selected, true);
        self.current = Some(selected);
        true
    }

    /// Re-scan the card list and select the system default card
    #[instrument(skip(self))]
    pub fn select_default_device(&mut self) -> bool {
        if let Err(e) = self.metadata.scan_cards() {
            error!(error = %e, "Failed to scan ALSA cards");
            return false;
        }

        match self.metadata.default_card() {
            Some(card) => self.select_card(card),
            None => {
                debug!("No sound card available");
                false
            }
        }
    }

    /// Announce the departure of the active device and clear it
    pub fn retire_current(&mut self) -> Option<SelectedDevice> {
        let retired = self.current.take()?;
        info!(device = %retired, "Deselecting USB audio device");
        self.announce(&retired, false);
        Some(retired)
    }

    fn wait_for(&self, card: u32, device: u32, kind: NodeKind) -> bool {
        self.registry
            .await_node(card, device, kind, self.node_timeout)
            .is_some()
    }

    // Devices without PCM streams are never announced, so arrivals and
    // departures stay paired.
    fn announce(&self, device: &SelectedDevice, present: bool) {
        if !device.has_audio() {
            return;
        }

        debug!(
            present,
            card = device.card,
            device = device.device,
            "Sending device notification"
        );
        if let Err(e) = self.sink.publish(&device.notification(present)) {
            warn!(
                present,
                card = device.card,
                device = device.device,
                error = %e,
                "Failed to publish device notification"
            );
        }
    }
}
