//! Integration tests for USB hotplug coordination
//!
//! These tests drive the coordinator through complete attach/detach
//! scenarios, including late node creation and events racing each other on
//! separate threads.

use sndplug_core::domain::fixtures::{BinderCall, FakeCard, RecordingBinder};
use sndplug_core::domain::{DeviceNotification, HotplugState, ReselectPolicy, UsbDeviceId};
use sndplug_tests::{node_names, Scenario};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn summary(events: &[DeviceNotification]) -> Vec<(bool, u32)> {
    events.iter().map(|e| (e.present, e.card)).collect()
}

// ============================================================================
// ATTACH / DETACH
// ============================================================================

#[test]
fn test_removal_cleans_up() {
    let s = Scenario::builder()
        .card(FakeCard::internal(0).playback().capture())
        .build();

    let card = FakeCard::usb(2).playback().capture();
    s.plug_with_nodes(card.clone());
    assert!(s.attach("U1"));

    let associations = s.coordinator.associations();
    assert_eq!(associations.len(), 1);
    assert_eq!(associations[0].0, UsbDeviceId::new("U1"));
    assert_eq!(associations[0].1.card, 2);

    s.unplug_with_nodes(&card);
    assert!(s.detach("U1"));

    assert!(s.coordinator.list_selected_devices().is_empty());
    assert_eq!(summary(&s.sink.events()), vec![(true, 2), (false, 2)]);
    assert_eq!(s.coordinator.state(), HotplugState::Idle);
}

#[test]
fn test_removal_falls_back_to_remaining_usb_card() {
    let s = Scenario::builder().build();
    let first = FakeCard::usb(1).playback();
    let second = FakeCard::usb(2).playback().capture();

    s.plug_with_nodes(first.clone());
    assert!(s.attach("U1"));
    s.plug_with_nodes(second.clone());
    assert!(s.attach("U2"));

    s.unplug_with_nodes(&second);
    assert!(s.detach("U2"));

    // Card 1 is selected again by the default-device fallback
    assert_eq!(s.coordinator.current_selection().unwrap().card, 1);
    assert_eq!(
        summary(&s.sink.events()),
        vec![(true, 1), (false, 1), (true, 2), (false, 2), (true, 1)]
    );

    s.unplug_with_nodes(&first);
    assert!(s.detach("U1"));
    assert!(s.coordinator.current_selection().is_none());
    assert_eq!(s.sink.arrivals(), s.sink.departures());
}

#[test]
fn test_unknown_and_duplicate_detach_are_noops() {
    let s = Scenario::builder().build();
    let card = FakeCard::usb(1).playback();
    s.plug_with_nodes(card.clone());
    assert!(s.attach("U1"));

    assert!(!s.detach("U9"));
    assert_eq!(s.sink.events().len(), 1);

    s.unplug_with_nodes(&card);
    assert!(s.detach("U1"));
    assert!(!s.detach("U1"));
    assert_eq!(s.sink.events().len(), 2);
}

#[test]
fn test_non_audio_device_is_ignored() {
    let s = Scenario::builder().build();
    s.plug_with_nodes(FakeCard::usb(1).playback());

    let keyboard = [sndplug_core::domain::UsbInterface::new(0x03, 0x01, 0x01)];
    assert!(!s
        .coordinator
        .on_usb_attached(&UsbDeviceId::new("U1"), &keyboard));
    assert!(s.sink.events().is_empty());
}

#[test]
fn test_attach_to_already_active_card_is_tracked() {
    let first = FakeCard::usb(1).playback();
    let second = FakeCard::usb(2).playback();
    let s = Scenario::builder()
        .card(first.clone())
        .card(second.clone())
        .build();
    for card in [&first, &second] {
        for name in node_names(card) {
            s.create_node(&name);
        }
    }

    // Both cards predate the events, so both attaches land on the default card
    assert!(s.attach("A"));
    assert!(s.attach("B"));
    let associations = s.coordinator.associations();
    assert_eq!(associations.len(), 2);
    assert!(associations.iter().all(|(_, device)| device.card == 2));

    s.unplug_with_nodes(&second);
    assert!(s.detach("B"));

    assert_eq!(s.coordinator.current_selection().unwrap().card, 1);
    assert_eq!(
        summary(&s.sink.events()),
        vec![(true, 2), (false, 2), (true, 1)]
    );
}

#[test]
fn test_metadata_failure_selects_nothing() {
    let s = Scenario::builder().build();
    s.plug_with_nodes(FakeCard::usb(1).playback());
    s.system.fail_scans(true);

    assert!(!s.attach("U1"));
    assert!(!s.coordinator.select_default_device());
    assert!(s.coordinator.associations().is_empty());
    assert!(s.sink.events().is_empty());
    assert_eq!(s.coordinator.state(), HotplugState::Idle);

    s.system.fail_scans(false);
    assert!(s.attach("U1"));
    assert_eq!(s.sink.arrivals(), 1);
}

#[test]
fn test_card_with_non_zero_device_number() {
    let s = Scenario::builder().build();
    let card = FakeCard::usb(3).device(1).playback().capture();
    s.plug_with_nodes(card.clone());

    assert!(s.attach("U1"));
    let current = s.coordinator.current_selection().unwrap();
    assert_eq!((current.card, current.device), (3, 1));
    assert_eq!(s.sink.events()[0].device, 1);

    s.unplug_with_nodes(&card);
    assert!(s.detach("U1"));
    assert_eq!(s.sink.departures(), 1);
}

// ============================================================================
// SELECTION POLICY
// ============================================================================

#[test]
fn test_newest_plugged_card_wins() {
    let s = Scenario::builder().card(FakeCard::usb(5).playback()).build();
    for name in node_names(&FakeCard::usb(5).playback()) {
        s.create_node(&name);
    }

    // Card 3 is new; card 5 is the default USB card
    s.plug_with_nodes(FakeCard::usb(3).playback());
    assert!(s.attach("U1"));
    assert_eq!(s.coordinator.current_selection().unwrap().card, 3);
}

#[test]
fn test_falls_back_to_default_usb_card_without_new_card() {
    let card = FakeCard::usb(5).playback().capture();
    let s = Scenario::builder().card(card.clone()).build();
    for name in node_names(&card) {
        s.create_node(&name);
    }

    assert!(s.attach("U1"));
    assert_eq!(s.coordinator.current_selection().unwrap().card, 5);
}

#[test]
fn test_select_card_is_idempotent() {
    let s = Scenario::builder().build();
    s.plug_with_nodes(FakeCard::usb(1).playback());

    assert!(s.coordinator.select_card(1));
    assert!(!s.coordinator.select_card(1));
    assert_eq!(s.sink.arrivals(), 1);
}

#[test]
fn test_replacement_departs_before_arriving() {
    let s = Scenario::builder().build();
    s.plug_with_nodes(FakeCard::usb(1).playback());
    s.plug_with_nodes(FakeCard::usb(2).playback());

    assert!(s.coordinator.select_card(1));
    assert!(s.coordinator.select_card(2));
    assert_eq!(
        summary(&s.sink.events()),
        vec![(true, 1), (false, 1), (true, 2)]
    );
}

#[test]
fn test_partial_capability_abort() {
    let s = Scenario::builder().timeout(Duration::from_millis(150)).build();
    s.system.plug(FakeCard::usb(3).playback().capture());
    s.create_node("pcmC3D0p");

    let start = Instant::now();
    assert!(!s.attach("U1"));
    assert!(start.elapsed() >= Duration::from_millis(150));

    assert!(s.coordinator.list_selected_devices().is_empty());
    assert!(s.coordinator.current_selection().is_none());
    assert!(s.sink.events().is_empty());
    assert_eq!(s.coordinator.state(), HotplugState::Idle);
}

#[test]
fn test_when_active_policy_keeps_current_selection() {
    let s = Scenario::builder()
        .reselect(ReselectPolicy::WhenActive)
        .build();
    let first = FakeCard::usb(1).playback();
    s.plug_with_nodes(first.clone());
    assert!(s.attach("U1"));
    s.plug_with_nodes(FakeCard::usb(2).playback());
    assert!(s.attach("U2"));

    s.unplug_with_nodes(&first);
    assert!(s.detach("U1"));

    assert_eq!(s.coordinator.current_selection().unwrap().card, 2);
    assert_eq!(
        summary(&s.sink.events()),
        vec![(true, 1), (false, 1), (true, 2)]
    );
}

#[test]
fn test_always_policy_reselects_after_inactive_detach() {
    let s = Scenario::builder().reselect(ReselectPolicy::Always).build();
    let first = FakeCard::usb(1).playback();
    s.plug_with_nodes(first.clone());
    assert!(s.attach("U1"));
    s.plug_with_nodes(FakeCard::usb(2).playback());
    assert!(s.attach("U2"));

    s.unplug_with_nodes(&first);
    assert!(s.detach("U1"));

    assert_eq!(s.coordinator.current_selection().unwrap().card, 2);
    assert_eq!(
        summary(&s.sink.events()),
        vec![(true, 1), (false, 1), (true, 2), (false, 2), (true, 2)]
    );
}

#[test]
fn test_at_most_one_active_over_event_sequence() {
    let s = Scenario::builder().build();
    let cards = [
        FakeCard::usb(1).playback(),
        FakeCard::usb(2).playback().capture(),
        FakeCard::usb(3).capture(),
    ];
    let ids = ["U1", "U2", "U3"];

    let steps: [(bool, usize); 9] = [
        (true, 0),
        (true, 1),
        (false, 0),
        (true, 2),
        (true, 0),
        (false, 1),
        (false, 2),
        (true, 1),
        (false, 0),
    ];

    for (attach, index) in steps {
        if attach {
            s.plug_with_nodes(cards[index].clone());
            s.attach(ids[index]);
        } else {
            s.unplug_with_nodes(&cards[index]);
            s.detach(ids[index]);
        }

        let associations = s.coordinator.associations();
        let unique: HashSet<_> = associations.iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(unique.len(), associations.len());

        let announced = s.sink.arrivals() - s.sink.departures();
        assert!(announced <= 1);
        assert_eq!(announced == 1, s.coordinator.current_selection().is_some());
    }
}

// ============================================================================
// MIDI
// ============================================================================

#[test]
fn test_midi_only_device_is_bound_but_not_announced() {
    let s = Scenario::builder().build();
    let card = FakeCard::usb(6).midi();
    s.plug_with_nodes(card.clone());

    assert!(s.attach("U1"));
    assert!(s.coordinator.list_selected_devices()[0].has_midi);

    s.unplug_with_nodes(&card);
    assert!(s.detach("U1"));

    assert!(s.sink.events().is_empty());
    assert_eq!(
        s.binder.calls(),
        vec![
            BinderCall::Added {
                card: 6,
                device: 0,
                usb_id: UsbDeviceId::new("U1")
            },
            BinderCall::Removed {
                usb_id: UsbDeviceId::new("U1")
            },
        ]
    );
}

#[test]
fn test_unreachable_binder_does_not_undo_selection() {
    let s = Scenario::builder()
        .binder(RecordingBinder::unreachable())
        .build();
    s.plug_with_nodes(FakeCard::usb(1).playback().capture().midi());

    assert!(s.attach("U1"));
    assert_eq!(s.coordinator.list_selected_devices().len(), 1);
    assert_eq!(s.sink.arrivals(), 1);
}

// ============================================================================
// NODE TIMING AND CONCURRENCY
// ============================================================================

#[test]
fn test_attach_waits_for_late_nodes() {
    let s = Scenario::builder().timeout(Duration::from_millis(2500)).build();
    let card = FakeCard::usb(1).playback().capture();
    s.system.plug(card.clone());

    let registry = Arc::clone(&s.registry);
    let producer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        for name in node_names(&card) {
            registry.apply(&sndplug_core::domain::NodeEvent::Created(name));
        }
    });

    let start = Instant::now();
    assert!(s.attach("U1"));
    let elapsed = start.elapsed();
    producer.join().unwrap();

    assert!(elapsed >= Duration::from_millis(90));
    assert!(elapsed < Duration::from_millis(1500));
}

#[test]
fn test_detach_during_selection_tears_down_afterwards() {
    let s = Scenario::builder().timeout(Duration::from_millis(2000)).build();
    let card = FakeCard::usb(2).playback();
    s.system.plug(card.clone());

    let coordinator = Arc::clone(&s.coordinator);
    let attach = thread::spawn(move || {
        coordinator.on_usb_attached(&UsbDeviceId::new("U1"), &sndplug_tests::audio_interfaces())
    });

    // The attach is now blocked waiting for the playback node
    thread::sleep(Duration::from_millis(50));
    s.system.unplug(card.card);

    let coordinator = Arc::clone(&s.coordinator);
    let detach = thread::spawn(move || coordinator.on_usb_detached(&UsbDeviceId::new("U1")));

    thread::sleep(Duration::from_millis(50));
    for name in node_names(&card) {
        s.create_node(&name);
    }

    assert!(attach.join().unwrap());
    assert!(detach.join().unwrap());

    assert!(s.coordinator.list_selected_devices().is_empty());
    assert_eq!(summary(&s.sink.events()), vec![(true, 2), (false, 2)]);
}

#[test]
fn test_malformed_node_name_is_dropped() {
    let s = Scenario::builder().build();
    s.create_node("garbage123");
    s.create_node("pcmCxD0p");

    assert!(s.registry.is_empty());
    assert!(!s.coordinator.dump().contains("garbage123"));
}

#[test]
fn test_watcher_feeds_coordinator() {
    use sndplug_infra::NodeWatcher;

    let dir = tempfile::TempDir::new().unwrap();
    let s = Scenario::builder().timeout(Duration::from_millis(2000)).build();
    let mut watcher = NodeWatcher::new(dir.path().to_path_buf(), Arc::clone(&s.registry));
    watcher.start().unwrap();

    let card = FakeCard::usb(1).playback().capture();
    s.system.plug(card.clone());

    let node_dir = dir.path().to_path_buf();
    let kernel = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        for name in node_names(&card) {
            std::fs::write(node_dir.join(name), b"").unwrap();
        }
    });

    assert!(s.attach("U1"));
    kernel.join().unwrap();
    assert_eq!(s.sink.arrivals(), 1);

    watcher.stop();
}
