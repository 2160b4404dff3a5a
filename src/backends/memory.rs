//! In-memory output sinks.
//!
//! Both types are cheap handles over shared state: clone one, give the clone to
//! the engine, and read the results from the original.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backends::{KeyboardInjector, PovValue, VirtualDeviceWriter};
use crate::binding::AxisSlot;

#[derive(Debug, Default)]
struct JoystickState {
    axes: HashMap<(u8, AxisSlot), i32>,
    buttons: HashMap<(u8, u16), bool>,
    povs: HashMap<(u8, u16), PovValue>,
    flushes: usize,
}

/// Virtual joystick that remembers the last value written to every slot.
#[derive(Clone, Debug, Default)]
pub struct MemoryJoystick {
    inner: Arc<Mutex<JoystickState>>,
}

impl MemoryJoystick {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, JoystickState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn axis(&self, device: u8, slot: AxisSlot) -> Option<i32> {
        self.state().axes.get(&(device, slot)).copied()
    }

    pub fn button(&self, device: u8, index: u16) -> Option<bool> {
        self.state().buttons.get(&(device, index)).copied()
    }

    pub fn pov(&self, device: u8, index: u16) -> Option<PovValue> {
        self.state().povs.get(&(device, index)).copied()
    }

    /// Completed ticks.
    pub fn flushes(&self) -> usize {
        self.state().flushes
    }
}

impl VirtualDeviceWriter for MemoryJoystick {
    fn set_axis(&mut self, device: u8, slot: AxisSlot, value: i32) {
        self.state().axes.insert((device, slot), value);
    }

    fn set_button(&mut self, device: u8, index: u16, pressed: bool) {
        self.state().buttons.insert((device, index), pressed);
    }

    fn set_pov(&mut self, device: u8, index: u16, value: PovValue) {
        self.state().povs.insert((device, index), value);
    }

    fn flush(&mut self) {
        self.state().flushes += 1;
    }
}

/// A key edge captured by [`RecordingKeyboard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyEvent {
    Press { key: String, modifiers: Vec<String> },
    Release { key: String, modifiers: Vec<String> },
}

/// Keyboard injector that records every edge in order.
#[derive(Clone, Debug, Default)]
pub struct RecordingKeyboard {
    events: Arc<Mutex<Vec<KeyEvent>>>,
}

impl RecordingKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<KeyEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, event: KeyEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl KeyboardInjector for RecordingKeyboard {
    fn press(&mut self, key: &str, modifiers: &[String]) {
        self.push(KeyEvent::Press {
            key: key.to_string(),
            modifiers: modifiers.to_vec(),
        });
    }

    fn release(&mut self, key: &str, modifiers: &[String]) {
        self.push(KeyEvent::Release {
            key: key.to_string(),
            modifiers: modifiers.to_vec(),
        });
    }
}
