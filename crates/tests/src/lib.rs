//! Shared scenario harness for the hotplug integration tests
//!
//! Wires a [`HotplugCoordinator`] to the in-memory collaborators from
//! `sndplug_core::domain::fixtures` so a test can plug cards, create nodes
//! and replay USB events.

use sndplug_core::domain::fixtures::{FakeCard, FakeMetadata, FakeSystem, RecordingBinder, RecordingSink};
use sndplug_core::domain::{
    HotplugCoordinator, MidiBinder, NodeEvent, NodeRegistry, NotificationSink, ReselectPolicy,
    SelectionEngine, UsbDeviceId, UsbInterface, USB_CLASS_AUDIO,
};
use std::sync::Arc;
use std::time::Duration;

pub struct Scenario {
    pub system: FakeSystem,
    pub registry: Arc<NodeRegistry>,
    pub sink: Arc<RecordingSink>,
    pub binder: Arc<RecordingBinder>,
    pub coordinator: Arc<HotplugCoordinator>,
}

pub struct ScenarioBuilder {
    cards: Vec<FakeCard>,
    binder: RecordingBinder,
    reselect: ReselectPolicy,
    timeout: Duration,
}

impl Default for ScenarioBuilder {
    fn default() -> Self {
        Self {
            cards: Vec::new(),
            binder: RecordingBinder::default(),
            reselect: ReselectPolicy::Always,
            timeout: Duration::from_millis(200),
        }
    }
}

impl ScenarioBuilder {
    /// A card present before the coordinator starts
    pub fn card(mut self, card: FakeCard) -> Self {
        self.cards.push(card);
        self
    }

    pub fn binder(mut self, binder: RecordingBinder) -> Self {
        self.binder = binder;
        self
    }

    pub fn reselect(mut self, reselect: ReselectPolicy) -> Self {
        self.reselect = reselect;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Scenario {
        let system = FakeSystem::new(self.cards);
        let registry = Arc::new(NodeRegistry::new());
        let sink = Arc::new(RecordingSink::default());
        let binder = Arc::new(self.binder);

        let engine = SelectionEngine::new(
            Box::new(FakeMetadata::new(system.clone())),
            Arc::clone(&registry),
            Arc::clone(&sink) as Arc<dyn NotificationSink>,
            self.timeout,
        );
        let coordinator = Arc::new(HotplugCoordinator::new(
            engine,
            Arc::clone(&registry),
            Arc::clone(&binder) as Arc<dyn MidiBinder>,
            self.reselect,
        ));

        Scenario {
            system,
            registry,
            sink,
            binder,
            coordinator,
        }
    }
}

impl Scenario {
    pub fn builder() -> ScenarioBuilder {
        ScenarioBuilder::default()
    }

    pub fn create_node(&self, name: &str) {
        self.registry.apply(&NodeEvent::Created(name.to_string()));
    }

    pub fn delete_node(&self, name: &str) {
        self.registry.apply(&NodeEvent::Deleted(name.to_string()));
    }

    /// Plug a card into the fake kernel together with its nodes
    pub fn plug_with_nodes(&self, card: FakeCard) {
        for name in node_names(&card) {
            self.create_node(&name);
        }
        self.system.plug(card);
    }

    /// Remove a card and its nodes from the fake kernel
    pub fn unplug_with_nodes(&self, card: &FakeCard) {
        self.system.unplug(card.card);
        for name in node_names(card) {
            self.delete_node(&name);
        }
    }

    pub fn attach(&self, usb_id: &str) -> bool {
        self.coordinator
            .on_usb_attached(&UsbDeviceId::new(usb_id), &audio_interfaces())
    }

    pub fn detach(&self, usb_id: &str) -> bool {
        self.coordinator.on_usb_detached(&UsbDeviceId::new(usb_id))
    }
}

/// Node names the kernel would create for `card`
pub fn node_names(card: &FakeCard) -> Vec<String> {
    let mut names = Vec::new();
    if card.playback {
        names.push(format!("pcmC{}D{}p", card.card, card.device));
    }
    if card.capture {
        names.push(format!("pcmC{}D{}c", card.card, card.device));
    }
    if card.midi {
        names.push(format!("midiC{}D{}", card.card, card.device));
    }
    names
}

/// Interface list of a typical USB audio device: control plus streaming
pub fn audio_interfaces() -> Vec<UsbInterface> {
    vec![
        UsbInterface::new(USB_CLASS_AUDIO, 0x01, 0x00),
        UsbInterface::new(USB_CLASS_AUDIO, 0x02, 0x00),
    ]
}
