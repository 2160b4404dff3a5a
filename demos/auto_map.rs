use std::time::Duration;

use stickmap::backends::{MemoryJoystick, RecordingKeyboard, ScriptedDevice};
use stickmap::*;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = EngineConfig::default();

    // A throttle with two typed axes, a slider, 12 buttons and a hat.
    let throttle = ScriptedDevice::with_axis_types(
        "virtual:throttle",
        "Demo Throttle",
        vec![PhysicalAxisType::Z, PhysicalAxisType::RZ, PhysicalAxisType::Slider],
        12,
        1,
    );
    let handle = throttle.handle();

    let mut profile = MappingProfile::new("demo");
    let report = auto_assign(&mut profile, &throttle.inventory(), &config.virtual_devices)
        .expect("at least one virtual device");
    println!(
        "auto-assigned onto vJoy {}: {} mappings, {} unmapped",
        report.device,
        report.created,
        report.unmapped.total()
    );
    for m in &profile.axis_mappings {
        println!("  {} -> {:?}", m.name, m.output);
    }

    let mut manager = DeviceManager::new();
    manager.add_device(throttle);
    let mut bus = InputEventBus::new();
    bus.add_listener(Logger::new(), EventFilter::All, None);

    let joy = MemoryJoystick::new();
    let engine = MappingEngine::new(SharedProfile::new(profile), config.axis_range);
    let mut poll = PollLoop::new(
        manager,
        bus,
        engine,
        joy.clone(),
        RecordingKeyboard::new(),
        config.poll_period(),
    );

    let cancel = CancellationToken::new();
    let runner = tokio::spawn({
        let cancel = cancel.clone();
        async move { poll.run(cancel).await }
    });

    // Push the throttle forward and hold a button for a moment.
    handle.set_axis(0, 0.8);
    handle.press(2);
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.release(2);
    handle.set_hat(0, 2);
    tokio::time::sleep(Duration::from_millis(100)).await;

    cancel.cancel();
    let ticks = runner.await.expect("poll loop task");

    println!("ran {ticks} ticks");
    println!("  Z       = {:?}", joy.axis(1, AxisSlot::Z));
    println!("  button2 = {:?}", joy.button(1, 2));
    println!("  pov0    = {:?}", joy.pov(1, 0));
}
