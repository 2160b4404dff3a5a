//! End-to-end runs of the mapping runtime.
//!
//! Scripted devices go in, the poll loop drives the engine, and the in-memory
//! joystick/keyboard record what came out. Exercises the boundary between
//! `manager`, `eventbus`, `detector`, `auto_assign`, `conflict` and `engine`.

use std::time::Duration;

use stickmap::backends::{KeyEvent, MemoryJoystick, RecordingKeyboard, ScriptedDevice};
use stickmap::conflict::Owner;
use stickmap::*;
use tokio_util::sync::CancellationToken;

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

// ── Poll loop + detector + auto-assign ──

#[tokio::test(start_paused = true)]
async fn poll_loop_feeds_detector_and_outputs() {
    let stick = ScriptedDevice::with_axis_types(
        "guid-stick",
        "Stick",
        vec![PhysicalAxisType::X, PhysicalAxisType::Y, PhysicalAxisType::Slider],
        8,
        1,
    );
    let handle = stick.handle();

    let mut profile = MappingProfile::new("auto");
    let caps = [VirtualCapacity::full(1, 32, 1, 0)];
    let report = auto_assign(&mut profile, &stick.inventory(), &caps).expect("a candidate device");
    assert!(!report.partial);
    assert_eq!(report.unmapped.total(), 0);
    assert_eq!(profile.mapping_count(), 3 + 8 + 1);

    let mut manager = DeviceManager::new();
    manager.add_device(stick);
    let mut bus = InputEventBus::new();
    bus.add_listener(Logger::new(), EventFilter::All, None);
    let detector = InputWaitDetector::new(bus.feed(), DetectorConfig::default());

    let joy = MemoryJoystick::new();
    let keys = RecordingKeyboard::new();
    let engine = MappingEngine::new(SharedProfile::new(profile), AxisRange::default());
    let mut poll = PollLoop::new(manager, bus, engine, joy.clone(), keys.clone(), ms(10));

    let session = detector.start(DetectFilter::Buttons);
    let cancel = CancellationToken::new();
    let runner = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            let ticks = poll.run(cancel).await;
            (poll, ticks)
        }
    });

    tokio::spawn(async move {
        tokio::time::sleep(ms(300)).await;
        handle.press(3);
        handle.set_axis(0, 1.0);
    });

    let outcome = session.wait().await;
    assert_eq!(outcome.input(), Some(&InputSource::button("guid-stick", 3)));
    assert_eq!(detector.state(), DetectState::Captured);

    tokio::time::sleep(ms(50)).await;
    assert_eq!(joy.button(1, 3), Some(true));
    assert_eq!(joy.button(1, 2), Some(false));
    assert_eq!(joy.axis(1, AxisSlot::X), Some(32767));
    assert_eq!(joy.axis(1, AxisSlot::Y), Some(16384));
    assert_eq!(joy.axis(1, AxisSlot::Slider0), Some(16384));
    assert_eq!(joy.pov(1, 0), Some(PovValue::Neutral));

    cancel.cancel();
    let (poll, ticks) = runner.await.expect("poll loop task");
    assert!(ticks >= 30);
    // Stopping the loop drops runtime state.
    assert!(poll.engine().button_state(&SlotKey::button(1, 3)).is_none());
    assert!(keys.events().is_empty());
}

// ── Keyboard output and disconnects ──

#[test]
fn keyboard_released_when_device_disconnects() {
    let stick = ScriptedDevice::new("guid-stick", "Stick", 1, 2, 0);
    let handle = stick.handle();

    let mut profile = MappingProfile::new("keys");
    let talk = ButtonMapping::new(
        "push to talk",
        InputSource::button("", 0),
        OutputTarget::Keyboard {
            device: 1,
            index: 0,
            key: "V".into(),
            modifiers: vec![],
        },
    );
    bind_input(
        &mut profile,
        BindTarget::New(MappingDraft::button(talk)),
        InputSource::new("guid-stick", "Stick", InputType::Button, 1),
        |_| true,
    )
    .unwrap();
    bind_input(
        &mut profile,
        BindTarget::New(MappingDraft::axis(
            "throttle",
            OutputTarget::VirtualAxis { device: 1, slot: AxisSlot::Z },
            AxisCurve::preset(CurveType::Exponential),
        )),
        InputSource::axis("guid-stick", 0),
        |_| true,
    )
    .unwrap();

    let mut manager = DeviceManager::new();
    manager.add_device(stick);
    let joy = MemoryJoystick::new();
    let keys = RecordingKeyboard::new();
    let engine = MappingEngine::new(SharedProfile::new(profile), AxisRange::new(-100, 100));
    let mut poll = PollLoop::new(
        manager,
        InputEventBus::new(),
        engine,
        joy.clone(),
        keys.clone(),
        ms(10),
    );

    handle.press(1);
    handle.set_axis(0, -0.5);
    poll.step(ms(10));
    poll.step(ms(10));
    assert_eq!(joy.axis(1, AxisSlot::Z), Some(-25));

    handle.disconnect();
    poll.step(ms(10));
    assert_eq!(joy.axis(1, AxisSlot::Z), Some(0));
    assert_eq!(
        keys.events(),
        vec![
            KeyEvent::Press { key: "V".into(), modifiers: vec![] },
            KeyEvent::Release { key: "V".into(), modifiers: vec![] },
        ]
    );
    assert!(!poll.manager_mut().devices()[0].connected);
}

// ── Conflict resolution through the public API ──

#[test]
fn rebinding_asks_before_stealing_an_input() {
    let trigger = InputSource::button("guid-stick", 0);
    let mut profile = MappingProfile::new("conflicts");
    bind_input(
        &mut profile,
        BindTarget::New(MappingDraft::button(ButtonMapping::new(
            "fire",
            trigger.clone(),
            OutputTarget::VirtualButton { device: 1, index: 0 },
        ))),
        trigger.clone(),
        |_| unreachable!("no owner yet"),
    )
    .unwrap();

    let alt = || {
        BindTarget::New(MappingDraft::button(ButtonMapping::new(
            "alt fire",
            trigger.clone(),
            OutputTarget::VirtualButton { device: 1, index: 1 },
        )))
    };

    let before = profile.clone();
    let mut asked = None;
    let outcome = bind_input(&mut profile, alt(), trigger.clone(), |owner| {
        asked = Some(owner.clone());
        false
    })
    .unwrap();
    assert_eq!(outcome, BindOutcome::Declined);
    assert_eq!(profile, before);
    assert_eq!(
        asked,
        Some(Owner {
            name: "fire".into(),
            slot: SlotKey::button(1, 0),
        })
    );

    let outcome = bind_input(&mut profile, alt(), trigger.clone(), |_| true).unwrap();
    assert!(matches!(outcome, BindOutcome::Bound { replaced: Some(_) }));
    assert_eq!(find_owner(&profile, &trigger).map(|o| o.slot), Some(SlotKey::button(1, 1)));
    // The emptied mapping is gone.
    assert_eq!(profile.button_mappings.len(), 1);
}
