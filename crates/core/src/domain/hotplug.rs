//! Hotplug coordinator
//!
//! Reacts to USB attach/detach events, decides which card becomes the
//! selected audio device and keeps the association between USB devices and
//! the devices selected for them.
//!
//! Locking: `engine` serializes every select/remove operation, so a detach
//! that arrives while the same device is still being selected waits for the
//! selection to finish and then tears it down. `tracked` is only held for
//! short map updates and snapshots, never across a notification or MIDI
//! binder call.

use std::fmt::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, instrument};

use super::config::ReselectPolicy;
use super::device::{SelectedDevice, UsbDeviceId, UsbInterface};
use super::registry::NodeRegistry;
use super::selection::SelectionEngine;
use super::sink::MidiBinder;

/// Coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotplugState {
    /// No external device tracked
    Idle,
    /// Scan and node wait in progress
    Selecting,
    /// At least one USB device is associated with a selected device
    Selected,
}

/// USB identity → selected device, in insertion order, plus the mirror of
/// the engine's current selection.
#[derive(Debug)]
struct Tracked {
    associations: Vec<(UsbDeviceId, SelectedDevice)>,
    current: Option<SelectedDevice>,
    state: HotplugState,
}

impl Tracked {
    fn insert(&mut self, usb_id: UsbDeviceId, device: SelectedDevice) {
        match self.associations.iter_mut().find(|(id, _)| *id == usb_id) {
            Some(entry) => entry.1 = device,
            None => self.associations.push((usb_id, device)),
        }
    }

    fn remove(&mut self, usb_id: &UsbDeviceId) -> Option<SelectedDevice> {
        let index = self.associations.iter().position(|(id, _)| id == usb_id)?;
        Some(self.associations.remove(index).1)
    }

    fn settle(&mut self, current: Option<SelectedDevice>) {
        self.current = current;
        self.state = if self.associations.is_empty() {
            HotplugState::Idle
        } else {
            HotplugState::Selected
        };
    }
}

pub struct HotplugCoordinator {
    engine: Mutex<SelectionEngine>,
    tracked: Mutex<Tracked>,
    registry: Arc<NodeRegistry>,
    midi: Arc<dyn MidiBinder>,
    reselect: ReselectPolicy,
}

impl HotplugCoordinator {
    pub fn new(
        engine: SelectionEngine,
        registry: Arc<NodeRegistry>,
        midi: Arc<dyn MidiBinder>,
        reselect: ReselectPolicy,
    ) -> Self {
        Self {
            engine: Mutex::new(engine),
            tracked: Mutex::new(Tracked {
                associations: Vec::new(),
                current: None,
                state: HotplugState::Idle,
            }),
            registry,
            midi,
            reselect,
        }
    }

    fn engine(&self) -> MutexGuard<'_, SelectionEngine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tracked(&self) -> MutexGuard<'_, Tracked> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_selecting(&self) {
        self.tracked().state = HotplugState::Selecting;
    }

    fn settle(&self, engine: &SelectionEngine) {
        self.tracked().settle(engine.current().cloned());
    }

    /// Handle a USB device attach
    ///
    /// Devices without an audio-class interface are ignored. Returns whether
    /// a device, newly selected or already active, was associated with
    /// `usb_id`.
    #[instrument(skip(self, interfaces), fields(usb_id = %usb_id))]
    pub fn on_usb_attached(&self, usb_id: &UsbDeviceId, interfaces: &[UsbInterface]) -> bool {
        if !interfaces.iter().any(UsbInterface::is_audio) {
            debug!("No audio interface, ignoring");
            return false;
        }

        let mut engine = self.engine();
        self.begin_selecting();

        let previous = engine.metadata().cards();
        if let Err(e) = engine.metadata_mut().scan_cards() {
            error!(error = %e, "Failed to scan ALSA cards");
        }

        // Newest plugged card wins over cards that were already present
        let target = engine
            .metadata()
            .newly_appeared_cards(&previous)
            .into_iter()
            .find(|c| c.is_usb)
            .map(|c| c.card)
            .or_else(|| engine.metadata().default_usb_card());

        let selected = match target {
            Some(card) => {
                if engine.select_card(card) {
                    engine.current().cloned()
                } else if let Some(active) = engine.current().filter(|d| d.card == card) {
                    // The card was selected before this device was seen
                    debug!(card, "USB card already active, associating it");
                    Some(active.clone())
                } else {
                    debug!(card, "USB card not selected");
                    None
                }
            }
            None => {
                debug!("No USB card found for attached device");
                None
            }
        };

        {
            let mut tracked = self.tracked();
            if let Some(device) = &selected {
                tracked.insert(usb_id.clone(), device.clone());
            }
            tracked.settle(engine.current().cloned());
        }

        let Some(device) = selected else {
            return false;
        };

        info!(device = %device, "USB audio device attached");
        if device.has_midi {
            if let Err(e) = self.midi.device_added(device.card, device.device, usb_id) {
                error!(error = %e, "MIDI binder failed to add device");
            }
        }
        true
    }

    /// Handle a USB device detach
    ///
    /// Unknown identities are a no-op. Returns whether an association was
    /// removed.
    #[instrument(skip(self), fields(usb_id = %usb_id))]
    pub fn on_usb_detached(&self, usb_id: &UsbDeviceId) -> bool {
        let mut engine = self.engine();

        let Some(device) = self.tracked().remove(usb_id) else {
            debug!("Detached device is not tracked");
            return false;
        };
        info!(device = %device, "USB audio device detached");

        // A device that was replaced by a later selection already departed
        let was_active = engine
            .current()
            .is_some_and(|current| current.same_endpoint(&device));
        if was_active {
            engine.retire_current();
        }
        self.settle(&engine);

        if device.has_midi {
            if let Err(e) = self.midi.device_removed(usb_id) {
                error!(error = %e, "MIDI binder failed to remove device");
            }
        }

        let reselect = match self.reselect {
            ReselectPolicy::Always => true,
            ReselectPolicy::WhenActive => was_active,
        };
        if reselect {
            engine.retire_current();
            self.begin_selecting();
            // If there are any external devices left, select one of them
            engine.select_default_device();
            self.settle(&engine);
        }
        true
    }

    /// Select a card directly, outside of any USB event
    pub fn select_card(&self, card: u32) -> bool {
        let mut engine = self.engine();
        self.begin_selecting();
        let selected = engine.select_card(card);
        self.settle(&engine);
        selected
    }

    /// Re-scan and select the system default card
    pub fn select_default_device(&self) -> bool {
        let mut engine = self.engine();
        self.begin_selecting();
        let selected = engine.select_default_device();
        self.settle(&engine);
        selected
    }

    /// Devices currently associated with a USB device, in attach order
    pub fn list_selected_devices(&self) -> Vec<SelectedDevice> {
        self.tracked()
            .associations
            .iter()
            .map(|(_, device)| device.clone())
            .collect()
    }

    /// USB identities with their devices, in attach order
    pub fn associations(&self) -> Vec<(UsbDeviceId, SelectedDevice)> {
        self.tracked().associations.clone()
    }

    /// The most recent selection, if still active
    pub fn current_selection(&self) -> Option<SelectedDevice> {
        self.tracked().current.clone()
    }

    pub fn state(&self) -> HotplugState {
        self.tracked().state
    }

    /// Diagnostic report of the tracked devices and registered nodes
    pub fn dump(&self) -> String {
        let (associations, current, state) = {
            let tracked = self.tracked();
            (
                tracked.associations.clone(),
                tracked.current.clone(),
                tracked.state,
            )
        };

        let mut out = String::new();
        let _ = writeln!(out, "USB audio hotplug state: {:?}", state);
        match &current {
            Some(device) => {
                let _ = writeln!(out, "  Selected: {}", device);
            }
            None => {
                let _ = writeln!(out, "  Selected: none");
            }
        }
        let _ = writeln!(out, "  USB AudioDevices:");
        for (usb_id, device) in &associations {
            let _ = writeln!(out, "    {}: {}", usb_id, device);
        }
        let _ = writeln!(out, "  ALSA nodes:");
        for node in self.registry.nodes() {
            let _ = writeln!(out, "    {}", node);
        }
        out
    }
}
