use tracing::{debug, info, trace};

use crate::event::{InputEvent, InputKind};
use crate::eventbus::InputListener;

/// Listener that traces every input event.
///
/// Connection changes go out at `info`, buttons and hats at `debug`, axis
/// motion at `trace` (it fires every tick while a stick moves).
#[derive(Debug, Default)]
pub struct Logger;

impl Logger {
    pub fn new() -> Self {
        Logger
    }
}

impl InputListener for Logger {
    fn on_input(&mut self, event: &InputEvent) {
        let device = event.device_id.as_str();
        match &event.kind {
            InputKind::AxisMoved { axis, value } => trace!(device, axis, value, "axis"),
            InputKind::ButtonPressed { button } => debug!(device, button, "pressed"),
            InputKind::ButtonReleased { button } => debug!(device, button, "released"),
            InputKind::HatChanged { hat, value } => debug!(device, hat, value, "hat"),
            InputKind::Connected { name } => info!(device, name = %name, "connected"),
            InputKind::Disconnected => info!(device, "disconnected"),
        }
    }
}
