//! Per-tick snapshots of device state.
//!
//! [`DeviceSnapshot`] is the level-state of one device at one poll: every axis
//! value, every button, every hat. [`Snapshot`] is an **owned**, read-only map
//! of those keyed by device id, produced by
//! [`DeviceManager::poll`](crate::manager::DeviceManager::poll) and consumed by
//! the mapping engine.
//!
//! # Semantics
//! - Only connected devices appear in a [`Snapshot`].
//! - Reads of missing devices or channels return the rest value: `0.0` for
//!   axes, `false` for buttons, `-1` (neutral) for hats. A disconnected device
//!   therefore drives its mappings back to rest instead of freezing them.
//!
//! ```no_run
//! use stickmap::{InputSource, Snapshot};
//!
//! fn trigger_down(snap: &Snapshot) -> bool {
//!     snap.button(&InputSource::button("guid-warthog-stick", 0))
//! }
//! ```

use std::collections::HashMap;

use crate::binding::{InputSource, InputType};
use crate::event::InputKind;

/// Hat value for a centred hat.
pub const HAT_NEUTRAL: i16 = -1;

/// Level state of one device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceSnapshot {
    /// Normalized to `[-1, 1]`.
    pub axes: Vec<f32>,
    pub buttons: Vec<bool>,
    /// `-1` neutral, `0..=7` directions (Up = 0, clockwise).
    pub hats: Vec<i16>,
}

impl DeviceSnapshot {
    /// All-rest state with the given channel counts.
    pub fn at_rest(axes: usize, buttons: usize, hats: usize) -> Self {
        Self {
            axes: vec![0.0; axes],
            buttons: vec![false; buttons],
            hats: vec![HAT_NEUTRAL; hats],
        }
    }

    #[inline]
    pub fn axis(&self, idx: u16) -> f32 {
        self.axes.get(idx as usize).copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn button(&self, idx: u16) -> bool {
        self.buttons.get(idx as usize).copied().unwrap_or(false)
    }

    #[inline]
    pub fn hat(&self, idx: u16) -> i16 {
        self.hats.get(idx as usize).copied().unwrap_or(HAT_NEUTRAL)
    }

    /// Channel deltas from `prev` to `self`. With no previous state every
    /// non-rest channel is reported.
    pub fn changes(&self, prev: Option<&DeviceSnapshot>) -> Vec<InputKind> {
        let rest = DeviceSnapshot::default();
        let prev = prev.unwrap_or(&rest);
        let mut out = Vec::new();

        for (i, v) in self.axes.iter().enumerate() {
            if *v != prev.axis(i as u16) {
                out.push(InputKind::AxisMoved {
                    axis: i as u16,
                    value: *v,
                });
            }
        }
        for (i, pressed) in self.buttons.iter().enumerate() {
            let button = i as u16;
            match (*pressed, prev.button(button)) {
                (true, false) => out.push(InputKind::ButtonPressed { button }),
                (false, true) => out.push(InputKind::ButtonReleased { button }),
                _ => {}
            }
        }
        for (i, v) in self.hats.iter().enumerate() {
            if *v != prev.hat(i as u16) {
                out.push(InputKind::HatChanged {
                    hat: i as u16,
                    value: *v,
                });
            }
        }
        out
    }
}

/// One device's state as broadcast to async subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSample {
    pub device_id: String,
    pub device_name: String,
    pub state: DeviceSnapshot,
}

/// Owned snapshot of all connected devices (`device_id → DeviceSnapshot`).
#[derive(Clone, Debug, Default)]
pub struct Snapshot(pub HashMap<String, DeviceSnapshot>);

impl Snapshot {
    /// Get the state for a specific `device_id`.
    #[inline]
    pub fn get(&self, device_id: &str) -> Option<&DeviceSnapshot> {
        self.0.get(device_id)
    }

    /// Iterate `(device_id, state)` pairs.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&String, &DeviceSnapshot)> {
        self.0.iter()
    }

    /// Consume the snapshot and return the inner map.
    #[inline]
    pub fn into_inner(self) -> HashMap<String, DeviceSnapshot> {
        self.0
    }

    pub fn insert(&mut self, device_id: impl Into<String>, state: DeviceSnapshot) {
        self.0.insert(device_id.into(), state);
    }

    /// Axis value of `src`, `0.0` when absent.
    pub fn axis(&self, src: &InputSource) -> f32 {
        debug_assert_eq!(src.kind, InputType::Axis);
        self.get(&src.device_id).map_or(0.0, |d| d.axis(src.index))
    }

    /// Button state of `src`, `false` when absent.
    pub fn button(&self, src: &InputSource) -> bool {
        debug_assert_eq!(src.kind, InputType::Button);
        self.get(&src.device_id).is_some_and(|d| d.button(src.index))
    }

    /// Hat value of `src`, neutral when absent.
    pub fn hat(&self, src: &InputSource) -> i16 {
        debug_assert_eq!(src.kind, InputType::Hat);
        self.get(&src.device_id).map_or(HAT_NEUTRAL, |d| d.hat(src.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_reads_rest() {
        let snap = Snapshot::default();
        assert_eq!(snap.axis(&InputSource::axis("gone", 0)), 0.0);
        assert!(!snap.button(&InputSource::button("gone", 0)));
        assert_eq!(snap.hat(&InputSource::hat("gone", 0)), HAT_NEUTRAL);

        let mut snap = Snapshot::default();
        snap.insert("stick", DeviceSnapshot::at_rest(1, 1, 1));
        assert_eq!(snap.axis(&InputSource::axis("stick", 5)), 0.0);
    }

    #[test]
    fn test_changes_report_edges() {
        let prev = DeviceSnapshot {
            axes: vec![0.0, 0.5],
            buttons: vec![true, false],
            hats: vec![HAT_NEUTRAL],
        };
        let next = DeviceSnapshot {
            axes: vec![0.0, -0.5],
            buttons: vec![false, true],
            hats: vec![2],
        };
        let changes = next.changes(Some(&prev));
        assert_eq!(changes.len(), 4);
        assert!(matches!(changes[0], InputKind::AxisMoved { axis: 1, .. }));
        assert!(matches!(changes[1], InputKind::ButtonReleased { button: 0 }));
        assert!(matches!(changes[2], InputKind::ButtonPressed { button: 1 }));
        assert!(matches!(changes[3], InputKind::HatChanged { hat: 0, value: 2 }));
    }

    #[test]
    fn test_first_poll_reports_non_rest_only() {
        let first = DeviceSnapshot {
            axes: vec![0.0, 0.25],
            buttons: vec![false, true],
            hats: vec![HAT_NEUTRAL],
        };
        let changes = first.changes(None);
        assert_eq!(changes.len(), 2);
    }
}
