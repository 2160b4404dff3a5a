//! Input events.
//!
//! Devices are polled for level state ([`DeviceSnapshot`](crate::snapshot::DeviceSnapshot));
//! the manager diffs successive snapshots into small, device-agnostic deltas
//! ([`InputKind`]) and timestamps them ([`InputEvent`]) for listeners on the
//! [`InputEventBus`](crate::eventbus::InputEventBus).
//!
//! ## Value conventions
//! - **Axes:** normalized to `[-1.0, 1.0]`.
//! - **Buttons:** press/release edges.
//! - **Hats (POV):** `-1` = neutral, `0..7` = 8-way directions (Up = 0, clockwise).

/// Per-device input change (delta).
#[derive(Clone, Debug, PartialEq)]
pub enum InputKind {
    /// A continuous channel changed.
    AxisMoved { axis: u16, value: f32 },

    /// A button transitioned to pressed.
    ButtonPressed { button: u16 },

    /// A button transitioned to released.
    ButtonReleased { button: u16 },

    /// A hat changed. `value`: `-1` = neutral, `0..7` = directions.
    HatChanged { hat: u16, value: i16 },

    /// Device started answering polls (first seen, or back after a disconnect).
    Connected { name: String },

    /// Device stopped answering polls. Its channels read as rest until it returns.
    Disconnected,
}

/// Timestamped input event captured by the manager.
#[derive(Clone, Debug)]
pub struct InputEvent {
    /// Capture time (monotonic). Suitable for ordering / delta timing within a run.
    pub at: std::time::Instant,
    /// Stable id of the device that produced the event.
    pub device_id: String,
    /// The actual input change.
    pub kind: InputKind,
}

impl InputEvent {
    pub fn now(device_id: impl Into<String>, kind: InputKind) -> Self {
        Self {
            at: std::time::Instant::now(),
            device_id: device_id.into(),
            kind,
        }
    }
}
