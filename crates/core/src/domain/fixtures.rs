//! In-memory collaborators for exercising the engine and coordinator
//!
//! [`FakeSystem`] stands in for the kernel: tests plug and unplug cards on it,
//! and a [`FakeMetadata`] sees the change on its next scan, just like the
//! procfs reader would.

use std::sync::{Arc, Mutex, PoisonError};

use super::device::{DeviceNotification, UsbDeviceId};
use super::metadata::{CardMetadata, CardRecord, MetadataError, Result, StreamRecord};
use super::node::NodeKind;
use super::sink::{BinderError, MidiBinder, NotificationSink, NotifyError};

/// A sound card as the fake kernel reports it
#[derive(Debug, Clone)]
pub struct FakeCard {
    pub card: u32,
    pub device: u32,
    pub is_usb: bool,
    pub playback: bool,
    pub capture: bool,
    pub midi: bool,
}

impl FakeCard {
    pub fn usb(card: u32) -> Self {
        Self {
            card,
            device: 0,
            is_usb: true,
            playback: false,
            capture: false,
            midi: false,
        }
    }

    pub fn internal(card: u32) -> Self {
        Self {
            is_usb: false,
            ..Self::usb(card)
        }
    }

    pub fn device(mut self, device: u32) -> Self {
        self.device = device;
        self
    }

    pub fn playback(mut self) -> Self {
        self.playback = true;
        self
    }

    pub fn capture(mut self) -> Self {
        self.capture = true;
        self
    }

    pub fn midi(mut self) -> Self {
        self.midi = true;
        self
    }

    fn record(&self) -> CardRecord {
        CardRecord {
            card: self.card,
            id: format!("Card{}", self.card),
            driver: if self.is_usb { "USB-Audio" } else { "HDA-Intel" }.to_string(),
            name: format!("Card {}", self.card),
            description: if self.is_usb {
                format!("Fake USB card {} at usb-0000:00:14.0-{}", self.card, self.card)
            } else {
                format!("Fake internal card {}", self.card)
            },
            is_usb: self.is_usb,
        }
    }

    fn streams(&self) -> Vec<StreamRecord> {
        [
            (self.playback, NodeKind::Playback),
            (self.capture, NodeKind::Capture),
            (self.midi, NodeKind::Midi),
        ]
        .into_iter()
        .filter(|(present, _)| *present)
        .map(|(_, kind)| StreamRecord {
            card: self.card,
            device: self.device,
            kind,
        })
        .collect()
    }
}

/// Shared view of the cards currently plugged into the fake kernel
#[derive(Debug, Clone, Default)]
pub struct FakeSystem {
    cards: Arc<Mutex<Vec<FakeCard>>>,
    fail_scans: Arc<Mutex<bool>>,
}

impl FakeSystem {
    pub fn new(cards: Vec<FakeCard>) -> Self {
        let system = Self::default();
        for card in cards {
            system.plug(card);
        }
        system
    }

    pub fn plug(&self, card: FakeCard) {
        let mut cards = self.cards.lock().unwrap_or_else(PoisonError::into_inner);
        cards.retain(|c| c.card != card.card);
        cards.push(card);
        cards.sort_by_key(|c| c.card);
    }

    pub fn unplug(&self, card: u32) {
        self.cards
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|c| c.card != card);
    }

    pub fn fail_scans(&self, fail: bool) {
        *self.fail_scans.lock().unwrap_or_else(PoisonError::into_inner) = fail;
    }

    fn snapshot(&self) -> Result<Vec<FakeCard>> {
        if *self.fail_scans.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(MetadataError::Malformed {
                path: "fake".to_string(),
                line: "scan failure".to_string(),
            });
        }
        Ok(self.cards.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

/// [`CardMetadata`] backed by a [`FakeSystem`]
#[derive(Debug)]
pub struct FakeMetadata {
    system: FakeSystem,
    cards: Vec<CardRecord>,
    streams: Vec<StreamRecord>,
}

impl FakeMetadata {
    /// Metadata over `system`, with an initial scan already done
    pub fn new(system: FakeSystem) -> Self {
        let mut metadata = Self {
            system,
            cards: Vec::new(),
            streams: Vec::new(),
        };
        let _ = metadata.scan_cards();
        let _ = metadata.scan_devices();
        metadata
    }

    pub fn with_cards(cards: Vec<FakeCard>) -> Self {
        Self::new(FakeSystem::new(cards))
    }
}

impl CardMetadata for FakeMetadata {
    fn scan_cards(&mut self) -> Result<()> {
        self.cards = self.system.snapshot()?.iter().map(FakeCard::record).collect();
        Ok(())
    }

    fn scan_devices(&mut self) -> Result<()> {
        self.streams = self
            .system
            .snapshot()?
            .iter()
            .flat_map(FakeCard::streams)
            .collect();
        Ok(())
    }

    fn cards(&self) -> Vec<CardRecord> {
        self.cards.clone()
    }

    fn streams(&self) -> Vec<StreamRecord> {
        self.streams.clone()
    }
}

/// Sink that records every published notification in order
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DeviceNotification>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<DeviceNotification> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn arrivals(&self) -> usize {
        self.events().iter().filter(|e| e.present).count()
    }

    pub fn departures(&self) -> usize {
        self.events().iter().filter(|e| !e.present).count()
    }
}

impl NotificationSink for RecordingSink {
    fn publish(&self, notification: &DeviceNotification) -> std::result::Result<(), NotifyError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(*notification);
        Ok(())
    }
}

/// Call observed by a [`RecordingBinder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinderCall {
    Added { card: u32, device: u32, usb_id: UsbDeviceId },
    Removed { usb_id: UsbDeviceId },
}

/// MIDI binder that records calls and can be told to fail
#[derive(Debug, Default)]
pub struct RecordingBinder {
    calls: Mutex<Vec<BinderCall>>,
    unreachable: bool,
}

impl RecordingBinder {
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<BinderCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, call: BinderCall) -> std::result::Result<(), BinderError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        if self.unreachable {
            return Err(BinderError::Unreachable);
        }
        Ok(())
    }
}

impl MidiBinder for RecordingBinder {
    fn device_added(
        &self,
        card: u32,
        device: u32,
        usb_id: &UsbDeviceId,
    ) -> std::result::Result<(), BinderError> {
        self.record(BinderCall::Added {
            card,
            device,
            usb_id: usb_id.clone(),
        })
    }

    fn device_removed(&self, usb_id: &UsbDeviceId) -> std::result::Result<(), BinderError> {
        self.record(BinderCall::Removed {
            usb_id: usb_id.clone(),
        })
    }
}
