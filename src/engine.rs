//! Per-tick evaluation of the active profile, and the poll loop driving it.
//!
//! [`MappingEngine::tick`] reads a [`Snapshot`] and writes every mapped output
//! once:
//! - axis mappings: combine inputs, shape through the deadzone/curve pipeline,
//!   scale to the writer's [`AxisRange`];
//! - button mappings: OR the inputs, advance the [`ButtonState`] for the mode,
//!   write a virtual button or emit key edges;
//! - hat mappings: first non-neutral input, converted to a [`PovValue`].
//!
//! While a shift layer's activator is held, the layer's button mappings own
//! the physical inputs they list and the base mappings read those inputs as
//! released.
//!
//! [`PollLoop`] ties a [`DeviceManager`], an [`InputEventBus`] and the engine
//! together on a fixed-rate tokio interval.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backends::{KeyboardInjector, PovValue, VirtualDeviceWriter};
use crate::binding::{
    ButtonMapping, InputSource, InputType, MappingProfile, OutputTarget, SlotKey, SlotKind,
};
use crate::button_mode::ButtonState;
use crate::eventbus::InputEventBus;
use crate::manager::DeviceManager;
use crate::snapshot::{Snapshot, HAT_NEUTRAL};
use crate::store::{SharedProfile, Version};
use crate::transform::{combine_axes, transform, AxisRange};

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeldKey {
    key: String,
    modifiers: Vec<String>,
}

/// Runtime side of a [`MappingProfile`].
///
/// Owns all per-mapping state; the profile itself is read through a
/// [`SharedProfile`] every tick so edits take effect on the next tick.
#[derive(Debug)]
pub struct MappingEngine {
    profile: SharedProfile,
    range: AxisRange,
    version: Option<Version>,
    buttons: HashMap<SlotKey, ButtonState>,
    layer_buttons: HashMap<(String, SlotKey), ButtonState>,
    held_keys: HashMap<SlotKey, HeldKey>,
}

impl MappingEngine {
    pub fn new(profile: SharedProfile, range: AxisRange) -> Self {
        Self {
            profile,
            range,
            version: None,
            buttons: HashMap::new(),
            layer_buttons: HashMap::new(),
            held_keys: HashMap::new(),
        }
    }

    pub fn profile(&self) -> &SharedProfile {
        &self.profile
    }

    pub fn range(&self) -> AxisRange {
        self.range
    }

    /// Runtime state of a base button mapping, once it has been ticked.
    pub fn button_state(&self, slot: &SlotKey) -> Option<&ButtonState> {
        self.buttons.get(slot)
    }

    /// Drop all mode state and release every held key.
    pub fn reset(&mut self, keyboard: &mut dyn KeyboardInjector) {
        self.buttons.clear();
        self.layer_buttons.clear();
        for (_, held) in self.held_keys.drain() {
            keyboard.release(&held.key, &held.modifiers);
        }
    }

    /// Evaluate every mapping against `snapshot`. `dt` is the time since the
    /// previous tick and drives the pulse/hold timers.
    pub fn tick(
        &mut self,
        snapshot: &Snapshot,
        dt: Duration,
        writer: &mut dyn VirtualDeviceWriter,
        keyboard: &mut dyn KeyboardInjector,
    ) {
        let (version, profile) = self.profile.versioned();
        self.sync_version(version, &profile, keyboard);

        for m in &profile.axis_mappings {
            let OutputTarget::VirtualAxis { device, slot } = &m.output else {
                continue;
            };
            let raw = combine_axes(
                m.inputs
                    .iter()
                    .filter(|i| i.kind == InputType::Axis)
                    .map(|i| snapshot.axis(i)),
            );
            writer.set_axis(*device, *slot, self.range.scale(transform(raw, &m.curve)));
        }

        for m in &profile.hat_mappings {
            let OutputTarget::VirtualPov { device, index } = &m.output else {
                continue;
            };
            let hat = m
                .inputs
                .iter()
                .filter(|i| i.kind == InputType::Hat)
                .map(|i| snapshot.hat(i))
                .find(|h| *h != HAT_NEUTRAL)
                .unwrap_or(HAT_NEUTRAL);
            writer.set_pov(*device, *index, PovValue::from_hat(hat, m.use_continuous));
        }

        let active: HashSet<&str> = profile
            .shift_layers
            .iter()
            .filter(|l| l.activator.kind == InputType::Button && snapshot.button(&l.activator))
            .map(|l| l.name.as_str())
            .collect();
        let overridden: HashSet<&InputSource> = profile
            .shift_layers
            .iter()
            .filter(|l| active.contains(l.name.as_str()))
            .flat_map(|l| l.button_mappings.iter().filter(|m| m.enabled))
            .flat_map(|m| m.inputs.iter())
            .collect();

        let mut outputs: Vec<(&OutputTarget, bool)> = Vec::new();
        for m in &profile.button_mappings {
            let state = self.buttons.entry(m.output.slot()).or_default();
            let pressed = any_pressed(snapshot, &m.inputs, |i| !overridden.contains(i));
            outputs.push((&m.output, drive(state, m, pressed, dt)));
        }
        for layer in &profile.shift_layers {
            let on = active.contains(layer.name.as_str());
            for m in &layer.button_mappings {
                let state = self
                    .layer_buttons
                    .entry((layer.name.clone(), m.output.slot()))
                    .or_default();
                let pressed = on && any_pressed(snapshot, &m.inputs, |_| true);
                outputs.push((&m.output, drive(state, m, pressed, dt)));
            }
        }
        self.write_buttons(outputs, writer, keyboard);

        writer.flush();
    }

    fn sync_version(
        &mut self,
        version: Version,
        profile: &MappingProfile,
        keyboard: &mut dyn KeyboardInjector,
    ) {
        match self.version {
            Some(seen) if seen == version => return,
            Some(seen) if seen.loads == version.loads => self.prune(profile, keyboard),
            Some(_) => {
                debug!(profile = %profile.name, "profile loaded, runtime state reset");
                self.reset(keyboard);
            }
            None => {}
        }
        self.version = Some(version);
    }

    /// Forget state belonging to mappings that no longer exist.
    fn prune(&mut self, profile: &MappingProfile, keyboard: &mut dyn KeyboardInjector) {
        let base: HashSet<SlotKey> =
            profile.button_mappings.iter().map(|m| m.output.slot()).collect();
        self.buttons.retain(|slot, _| base.contains(slot));
        self.layer_buttons.retain(|(name, slot), _| {
            profile
                .layer(name)
                .is_some_and(|l| l.button_mappings.iter().any(|m| m.output.slot() == *slot))
        });

        let keyed: HashSet<SlotKey> = profile
            .button_mappings
            .iter()
            .chain(profile.shift_layers.iter().flat_map(|l| l.button_mappings.iter()))
            .filter(|m| matches!(m.output, OutputTarget::Keyboard { .. }))
            .map(|m| m.output.slot())
            .collect();
        let stale: Vec<SlotKey> = self
            .held_keys
            .keys()
            .filter(|slot| !keyed.contains(slot))
            .copied()
            .collect();
        for slot in stale {
            if let Some(held) = self.held_keys.remove(&slot) {
                keyboard.release(&held.key, &held.modifiers);
            }
        }
        debug!(buttons = self.buttons.len(), "runtime state pruned");
    }

    /// Merge contributions per slot (any contributor on wins) and write each slot once.
    fn write_buttons(
        &mut self,
        outputs: Vec<(&OutputTarget, bool)>,
        writer: &mut dyn VirtualDeviceWriter,
        keyboard: &mut dyn KeyboardInjector,
    ) {
        let mut merged: Vec<(SlotKey, &OutputTarget, bool)> = Vec::with_capacity(outputs.len());
        for (target, on) in outputs {
            let slot = target.slot();
            if slot.kind != SlotKind::Button {
                continue;
            }
            match merged.iter_mut().find(|(s, _, _)| *s == slot) {
                Some(entry) => {
                    if on && !entry.2 {
                        entry.1 = target;
                        entry.2 = true;
                    }
                }
                None => merged.push((slot, target, on)),
            }
        }

        for (slot, target, on) in merged {
            let wanted = match target {
                OutputTarget::Keyboard { key, modifiers, .. } => on.then(|| HeldKey {
                    key: key.clone(),
                    modifiers: modifiers.clone(),
                }),
                _ => {
                    writer.set_button(slot.device, slot.index, on);
                    None
                }
            };
            self.sync_key(slot, wanted, keyboard);
        }
    }

    /// Emit press/release so the injected key follows the wanted state.
    fn sync_key(
        &mut self,
        slot: SlotKey,
        wanted: Option<HeldKey>,
        keyboard: &mut dyn KeyboardInjector,
    ) {
        let held = self.held_keys.remove(&slot);
        if held.is_some() && held == wanted {
            if let Some(held) = held {
                self.held_keys.insert(slot, held);
            }
            return;
        }
        if let Some(held) = held {
            keyboard.release(&held.key, &held.modifiers);
        }
        if let Some(wanted) = wanted {
            keyboard.press(&wanted.key, &wanted.modifiers);
            self.held_keys.insert(slot, wanted);
        }
    }
}

fn any_pressed(
    snapshot: &Snapshot,
    inputs: &[InputSource],
    usable: impl Fn(&InputSource) -> bool,
) -> bool {
    inputs
        .iter()
        .filter(|i| i.kind == InputType::Button && usable(i))
        .any(|i| snapshot.button(i))
}

fn drive(state: &mut ButtonState, m: &ButtonMapping, pressed: bool, dt: Duration) -> bool {
    if !m.enabled {
        state.reset();
        return false;
    }
    state.tick(m.mode, pressed, dt, m.timings())
}

/// Fixed-rate loop: poll devices, notify the bus, tick the engine.
pub struct PollLoop {
    manager: DeviceManager,
    bus: InputEventBus,
    engine: MappingEngine,
    writer: Box<dyn VirtualDeviceWriter>,
    keyboard: Box<dyn KeyboardInjector>,
    period: Duration,
}

impl PollLoop {
    pub fn new(
        manager: DeviceManager,
        bus: InputEventBus,
        engine: MappingEngine,
        writer: impl VirtualDeviceWriter + 'static,
        keyboard: impl KeyboardInjector + 'static,
        period: Duration,
    ) -> Self {
        Self {
            manager,
            bus,
            engine,
            writer: Box::new(writer),
            keyboard: Box::new(keyboard),
            period,
        }
    }

    pub fn manager_mut(&mut self) -> &mut DeviceManager {
        &mut self.manager
    }

    pub fn bus_mut(&mut self) -> &mut InputEventBus {
        &mut self.bus
    }

    pub fn engine(&self) -> &MappingEngine {
        &self.engine
    }

    /// One poll and one engine tick.
    pub fn step(&mut self, dt: Duration) {
        let polled = self.manager.poll();
        self.bus.emit_all(&polled.events);
        self.bus.publish_samples(polled.samples);
        self.engine
            .tick(&polled.snapshot, dt, self.writer.as_mut(), self.keyboard.as_mut());
    }

    /// Run until `cancel` fires. Missed ticks are skipped, not bunched up.
    ///
    /// Held keys are released on the way out. Returns the number of ticks run.
    pub async fn run(&mut self, cancel: CancellationToken) -> u64 {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(period_ms = self.period.as_secs_f64() * 1000.0, "poll loop running");

        let mut last = Instant::now();
        let mut ticks = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                now = ticker.tick() => {
                    let dt = now.saturating_duration_since(last);
                    last = now;
                    self.step(dt);
                    ticks += 1;
                }
            }
        }

        self.engine.reset(self.keyboard.as_mut());
        info!(ticks, "poll loop stopped");
        ticks
    }
}
