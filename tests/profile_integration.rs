//! Profiles on disk: save, load, repair, and hand-off to a running engine.

use std::path::PathBuf;
use std::time::Duration;

use stickmap::backends::{MemoryJoystick, RecordingKeyboard};
use stickmap::persist::decode_profile;
use stickmap::*;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("stickmap-it-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn warthog() -> MappingProfile {
    let mut profile = MappingProfile::new("Warthog");
    let curve = AxisCurve::custom([(0.25, 0.1), (0.75, 0.6)])
        .unwrap()
        .with_deadzone(Deadzone::centered(0.05).unwrap());
    profile.upsert_axis(AxisMapping {
        name: "pitch".into(),
        inputs: vec![InputSource::new("guid-stick", "Warthog Stick", InputType::Axis, 1)],
        output: OutputTarget::VirtualAxis {
            device: 1,
            slot: AxisSlot::Y,
        },
        curve,
    });
    let mut boat = ShiftLayer::new("boat switch", InputSource::button("guid-throttle", 20));
    boat.button_mappings.push(
        ButtonMapping::new(
            "flaps",
            InputSource::button("guid-stick", 4),
            OutputTarget::VirtualButton { device: 1, index: 12 },
        )
        .with_mode(ButtonMode::HoldToActivate),
    );
    profile.upsert_layer(boat);
    profile
}

// ── Store round trip ──

#[test]
fn saved_profile_loads_back_identical() {
    let dir = scratch_dir("round-trip");
    let store = JsonDirStore::new(&dir);
    let profile = warthog();

    store.save("warthog", &profile).unwrap();
    assert!(dir.join("warthog.json").exists());
    assert_eq!(store.list().unwrap(), vec!["warthog".to_string()]);

    let (loaded, report) = store.load("warthog").unwrap();
    assert!(report.is_clean(), "{:?}", report.issues);
    assert_eq!(loaded, profile);

    let _ = std::fs::remove_dir_all(&dir);
}

// ── Repair on load ──

#[test]
fn hand_edited_profile_is_repaired_per_mapping() {
    let json = r#"{
        "name": "edited",
        "created_at": "2024-03-01T12:00:00Z",
        "modified_at": "2024-03-02T12:00:00Z",
        "axis_mappings": [
            {
                "name": "roll",
                "inputs": [{"device_id": "s", "device_name": "Stick", "kind": "Axis", "index": 0}],
                "output": {"type": "VirtualAxis", "device": 1, "slot": "X"},
                "curve": {
                    "curve_type": "Custom",
                    "control_points": [{"x": 0.5, "y": 0.2}, {"x": 1.0, "y": 1.0}],
                    "deadzone": {
                        "min": -1.0,
                        "center_min": 0.1,
                        "center_max": 0.1,
                        "max": 1.0,
                        "center_enabled": true
                    }
                }
            },
            {
                "name": "stolen",
                "inputs": [{"device_id": "s", "device_name": "Stick", "kind": "Axis", "index": 0}],
                "output": {"type": "VirtualAxis", "device": 1, "slot": "Y"}
            }
        ],
        "button_mappings": [
            {
                "name": "tap",
                "inputs": [
                    {"device_id": "s", "device_name": "Stick", "kind": "Button", "index": 0}
                ],
                "output": {"type": "Keyboard", "device": 1, "index": 0, "key": "Space"},
                "mode": "Pulse",
                "pulse_duration_ms": 5000
            },
            {
                "name": "wrong output",
                "inputs": [
                    {"device_id": "s", "device_name": "Stick", "kind": "Button", "index": 1}
                ],
                "output": {"type": "VirtualAxis", "device": 1, "slot": "Z"}
            },
            {
                "name": "unknown mode",
                "inputs": [
                    {"device_id": "s", "device_name": "Stick", "kind": "Button", "index": 2}
                ],
                "output": {"type": "VirtualButton", "device": 1, "index": 2},
                "mode": "DoubleTap"
            }
        ]
    }"#;

    let (profile, report) = decode_profile(json).unwrap();
    assert_eq!(report.repaired, 2);
    assert_eq!(report.rejected, 3);
    assert_eq!(report.issues.len(), 7);

    assert_eq!(profile.name, "edited");
    assert_eq!(profile.created_at.to_rfc3339(), "2024-03-01T12:00:00+00:00");

    let roll = &profile.axis_mappings[0];
    assert_eq!(profile.axis_mappings.len(), 1);
    assert!(roll.curve.points_valid());
    assert_eq!(roll.curve.control_points.len(), 3);
    assert_eq!(roll.curve.deadzone.center_min, 0.0);

    assert_eq!(profile.button_mappings.len(), 1);
    assert_eq!(profile.button_mappings[0].pulse_duration_ms, 1000);
}

// ── Loading into a live engine ──

#[test]
fn replacing_the_profile_takes_effect_next_tick() {
    let shared = SharedProfile::default();
    let mut engine = MappingEngine::new(shared.clone(), AxisRange::new(0, 1000));
    let mut joy = MemoryJoystick::new();
    let mut keys = RecordingKeyboard::new();

    let mut snapshot = Snapshot::default();
    snapshot.insert(
        "guid-stick",
        DeviceSnapshot {
            axes: vec![0.0, 1.0],
            buttons: vec![false; 8],
            hats: vec![],
        },
    );

    engine.tick(&snapshot, Duration::from_millis(10), &mut joy, &mut keys);
    assert_eq!(joy.axis(1, AxisSlot::Y), None);

    let dir = scratch_dir("live");
    let store = JsonDirStore::new(&dir);
    store.save("warthog", &warthog()).unwrap();
    let (loaded, _) = store.load("warthog").unwrap();
    shared.replace(loaded);

    engine.tick(&snapshot, Duration::from_millis(10), &mut joy, &mut keys);
    assert_eq!(joy.axis(1, AxisSlot::Y), Some(1000));
    // Layer inactive: its mapping writes released.
    assert_eq!(joy.button(1, 12), Some(false));

    let _ = std::fs::remove_dir_all(&dir);
}

// ── Engine config ──

#[test]
fn config_feeds_auto_assign_candidates() {
    let config = EngineConfig::parse(
        r#"
[[virtual_devices]]
device = 1
axes = ["X", "Y"]
button_count = 4

[[virtual_devices]]
device = 2
axes = ["X", "Y", "Z", "RX", "RY", "RZ"]
button_count = 16
cont_pov_count = 1
"#,
    )
    .unwrap();

    let inventory = DeviceInventory {
        device_id: "guid-throttle".into(),
        device_name: "Throttle".into(),
        axis_types: vec![PhysicalAxisType::Z, PhysicalAxisType::Slider],
        button_count: 10,
        hat_count: 1,
    };
    let mut profile = MappingProfile::new("throttle");
    let report = auto_assign(&mut profile, &inventory, &config.virtual_devices).unwrap();

    assert_eq!(report.device, 2);
    assert!(!report.partial);
    // No slider slot on device 2: the slider falls back to the first free axis.
    let slider = profile
        .axis_mappings
        .iter()
        .find(|m| m.inputs[0].index == 1)
        .unwrap();
    assert_eq!(slider.output, OutputTarget::VirtualAxis { device: 2, slot: AxisSlot::X });
}
