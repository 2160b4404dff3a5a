//! Physical device contract.
//!
//! Backends (HID, XInput, test doubles) implement [`Device`]; the
//! [`DeviceManager`](crate::manager::DeviceManager) polls them at a fixed rate.
//!
//! # Identity
//! [`Device::id`] must be stable across reconnects (a GUID or a
//! vendor/product/serial fingerprint). Bindings are keyed by it, so a device
//! that drops off the bus and comes back keeps its mappings.

use serde::{Deserialize, Serialize};

use crate::snapshot::DeviceSnapshot;

/// What a physical axis reports itself as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhysicalAxisType {
    X,
    Y,
    Z,
    RX,
    RY,
    RZ,
    Slider,
    Unknown,
}

impl PhysicalAxisType {
    /// Classify a HID Generic Desktop usage (`0x30..=0x36`).
    pub fn from_hid_usage(usage: u16) -> Self {
        match usage {
            0x30 => PhysicalAxisType::X,
            0x31 => PhysicalAxisType::Y,
            0x32 => PhysicalAxisType::Z,
            0x33 => PhysicalAxisType::RX,
            0x34 => PhysicalAxisType::RY,
            0x35 => PhysicalAxisType::RZ,
            0x36 | 0x37 => PhysicalAxisType::Slider,
            _ => PhysicalAxisType::Unknown,
        }
    }
}

/// Control inventory of a physical device, as used by auto-assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInventory {
    pub device_id: String,
    pub device_name: String,
    /// One entry per axis, in channel order.
    pub axis_types: Vec<PhysicalAxisType>,
    pub button_count: u16,
    pub hat_count: u16,
}

impl DeviceInventory {
    pub fn axis_count(&self) -> usize {
        self.axis_types.len()
    }

    /// Axes + buttons + hats.
    pub fn total(&self) -> u32 {
        self.axis_count() as u32 + self.button_count as u32 + self.hat_count as u32
    }
}

/// A pollable physical input device.
pub trait Device: Send {
    /// Stable identity; survives reconnection.
    fn id(&self) -> &str;

    /// User-facing name.
    fn name(&self) -> &str;

    /// Channel inventory.
    fn inventory(&self) -> DeviceInventory;

    /// Current state, or `None` while the device is disconnected.
    fn poll(&mut self) -> Option<DeviceSnapshot>;
}
