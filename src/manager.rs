//! Device ownership and polling.
//!
//! [`DeviceManager`] owns every [`Device`], polls them once per tick and turns
//! the results into:
//! - a [`Snapshot`] of connected devices for the mapping engine,
//! - diffed [`InputEvent`]s (including connect/disconnect) for bus listeners,
//! - raw [`DeviceSample`]s for async subscribers.

use std::collections::HashMap;
use tracing::info;

use crate::device::{Device, DeviceInventory};
use crate::event::{InputEvent, InputKind};
use crate::snapshot::{DeviceSample, DeviceSnapshot, Snapshot};

/// Everything one poll produced.
#[derive(Debug, Default)]
pub struct PollResult {
    pub snapshot: Snapshot,
    pub events: Vec<InputEvent>,
    pub samples: Vec<DeviceSample>,
}

/// Identity of a managed device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub connected: bool,
}

#[derive(Default)]
pub struct DeviceManager {
    devices: Vec<Box<dyn Device>>,
    /// Last state of each connected device, by id.
    last: HashMap<String, DeviceSnapshot>,
}

impl DeviceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a device. A device with the same id replaces the old one.
    pub fn add_device<D: Device + 'static>(&mut self, device: D) {
        self.add_boxed(Box::new(device));
    }

    pub fn add_boxed(&mut self, device: Box<dyn Device>) {
        self.devices.retain(|d| d.id() != device.id());
        info!(device = device.id(), name = device.name(), "device added");
        self.devices.push(device);
    }

    /// Drop a device. Its channels read as rest from the next poll on.
    pub fn remove_device(&mut self, id: &str) -> bool {
        let before = self.devices.len();
        self.devices.retain(|d| d.id() != id);
        self.last.remove(id);
        self.devices.len() != before
    }

    pub fn devices(&self) -> Vec<DeviceInfo> {
        self.devices
            .iter()
            .map(|d| DeviceInfo {
                id: d.id().to_string(),
                name: d.name().to_string(),
                connected: self.last.contains_key(d.id()),
            })
            .collect()
    }

    /// Inventory of a managed device, for auto-assignment.
    pub fn inventory(&self, id: &str) -> Option<DeviceInventory> {
        self.devices.iter().find(|d| d.id() == id).map(|d| d.inventory())
    }

    /// Poll every device once.
    pub fn poll(&mut self) -> PollResult {
        let mut result = PollResult::default();

        for device in self.devices.iter_mut() {
            let id = device.id().to_string();
            match device.poll() {
                Some(state) => {
                    let prev = self.last.get(&id);
                    if prev.is_none() {
                        info!(device = %id, name = device.name(), "device connected");
                        result.events.push(InputEvent::now(
                            id.clone(),
                            InputKind::Connected {
                                name: device.name().to_string(),
                            },
                        ));
                    }
                    result.events.extend(
                        state
                            .changes(prev)
                            .into_iter()
                            .map(|kind| InputEvent::now(id.clone(), kind)),
                    );
                    result.samples.push(DeviceSample {
                        device_id: id.clone(),
                        device_name: device.name().to_string(),
                        state: state.clone(),
                    });
                    result.snapshot.insert(id.clone(), state.clone());
                    self.last.insert(id, state);
                }
                None => {
                    if self.last.remove(&id).is_some() {
                        info!(device = %id, "device disconnected");
                        result.events.push(InputEvent::now(id, InputKind::Disconnected));
                    }
                }
            }
        }

        result
    }
}
