use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::device::{Device, DeviceInventory, PhysicalAxisType};
use crate::snapshot::{DeviceSnapshot, HAT_NEUTRAL};

#[derive(Debug)]
struct ScriptState {
    state: DeviceSnapshot,
    connected: bool,
}

/// Physical device whose state is set from code.
///
/// Useful for tests, demos and replaying captured input. The device itself is
/// handed to a [`DeviceManager`](crate::manager::DeviceManager); keep a
/// [`ScriptHandle`] to drive it afterwards.
pub struct ScriptedDevice {
    id: String,
    name: String,
    axis_types: Vec<PhysicalAxisType>,
    shared: Arc<Mutex<ScriptState>>,
}

/// Cloneable control handle for a [`ScriptedDevice`].
#[derive(Clone, Debug)]
pub struct ScriptHandle {
    shared: Arc<Mutex<ScriptState>>,
}

impl ScriptedDevice {
    /// Device with untyped axes, all channels at rest.
    pub fn new(id: &str, name: &str, axes: usize, buttons: usize, hats: usize) -> Self {
        Self::with_axis_types(id, name, vec![PhysicalAxisType::Unknown; axes], buttons, hats)
    }

    pub fn with_axis_types(
        id: &str,
        name: &str,
        axis_types: Vec<PhysicalAxisType>,
        buttons: usize,
        hats: usize,
    ) -> Self {
        let state = DeviceSnapshot::at_rest(axis_types.len(), buttons, hats);
        Self {
            id: id.to_string(),
            name: name.to_string(),
            axis_types,
            shared: Arc::new(Mutex::new(ScriptState {
                state,
                connected: true,
            })),
        }
    }

    pub fn handle(&self) -> ScriptHandle {
        ScriptHandle {
            shared: self.shared.clone(),
        }
    }
}

fn lock(shared: &Mutex<ScriptState>) -> MutexGuard<'_, ScriptState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptHandle {
    /// Set an axis value (clamped to `[-1, 1]`). Out-of-range indices are ignored.
    pub fn set_axis(&self, axis: u16, value: f32) {
        if let Some(v) = lock(&self.shared).state.axes.get_mut(axis as usize) {
            *v = value.clamp(-1.0, 1.0);
        }
    }

    pub fn set_button(&self, button: u16, pressed: bool) {
        if let Some(b) = lock(&self.shared).state.buttons.get_mut(button as usize) {
            *b = pressed;
        }
    }

    pub fn press(&self, button: u16) {
        self.set_button(button, true);
    }

    pub fn release(&self, button: u16) {
        self.set_button(button, false);
    }

    /// `-1` neutral, `0..=7` directions.
    pub fn set_hat(&self, hat: u16, value: i16) {
        if let Some(h) = lock(&self.shared).state.hats.get_mut(hat as usize) {
            *h = if (0..=7).contains(&value) { value } else { HAT_NEUTRAL };
        }
    }

    /// Stop answering polls. State is kept for [`reconnect`](Self::reconnect).
    pub fn disconnect(&self) {
        lock(&self.shared).connected = false;
    }

    pub fn reconnect(&self) {
        lock(&self.shared).connected = true;
    }
}

impl Device for ScriptedDevice {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn inventory(&self) -> DeviceInventory {
        let guard = lock(&self.shared);
        DeviceInventory {
            device_id: self.id.clone(),
            device_name: self.name.clone(),
            axis_types: self.axis_types.clone(),
            button_count: guard.state.buttons.len() as u16,
            hat_count: guard.state.hats.len() as u16,
        }
    }

    fn poll(&mut self) -> Option<DeviceSnapshot> {
        let guard = lock(&self.shared);
        guard.connected.then(|| guard.state.clone())
    }
}
