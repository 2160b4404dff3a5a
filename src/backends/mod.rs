//! Output contracts and in-process backends.
//!
//! The engine writes through two traits:
//! - [`VirtualDeviceWriter`] receives axis/button/POV values for a virtual
//!   joystick (vJoy, uinput, ...) in the writer's native units;
//! - [`KeyboardInjector`] receives key press/release edges for keyboard mappings.
//!
//! Driver bindings live outside this crate. What ships here are in-process
//! implementations: [`ScriptedDevice`] is a physical [`Device`](crate::device::Device)
//! fed from code, [`MemoryJoystick`] and [`RecordingKeyboard`] capture output.

use serde::{Deserialize, Serialize};

use crate::binding::AxisSlot;

pub mod memory;
pub mod scripted;

pub use memory::{KeyEvent, MemoryJoystick, RecordingKeyboard};
pub use scripted::{ScriptHandle, ScriptedDevice};

/// Value written to a virtual POV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PovValue {
    Neutral,
    /// Hundredths of a degree clockwise from up, `0..36000`.
    Continuous(u16),
    /// 4-way: `0` up, `1` right, `2` down, `3` left.
    Discrete(u8),
}

impl PovValue {
    /// Convert an 8-way hat reading (`-1` neutral, `0..=7` clockwise from up).
    ///
    /// Discrete POVs only have four directions; a diagonal reports the cardinal
    /// direction just counter-clockwise of it (up-right → up).
    pub fn from_hat(hat: i16, continuous: bool) -> Self {
        if !(0..=7).contains(&hat) {
            return PovValue::Neutral;
        }
        if continuous {
            PovValue::Continuous(hat as u16 * 4500)
        } else {
            PovValue::Discrete((hat / 2) as u8)
        }
    }
}

/// Sink for virtual joystick output.
pub trait VirtualDeviceWriter: Send {
    fn set_axis(&mut self, device: u8, slot: AxisSlot, value: i32);

    fn set_button(&mut self, device: u8, index: u16, pressed: bool);

    fn set_pov(&mut self, device: u8, index: u16, value: PovValue);

    /// End of tick. Drivers that batch updates submit here.
    fn flush(&mut self) {}
}

/// Sink for keystroke output.
pub trait KeyboardInjector: Send {
    fn press(&mut self, key: &str, modifiers: &[String]);

    fn release(&mut self, key: &str, modifiers: &[String]);
}
