//! Binding data model and the profile-level store operations.
//!
//! A [`MappingProfile`] owns three collections of mappings (axis, button, hat)
//! plus optional [`ShiftLayer`]s. Every mapping fans in one or more physical
//! [`InputSource`]s onto exactly one [`OutputTarget`] slot.
//!
//! Two structural rules hold for a well-formed profile:
//! - an output slot ([`SlotKey`]) is owned by at most one mapping. Insertion
//!   always looks the slot up first (see [`MappingProfile::upsert_axis`] and
//!   friends);
//! - a physical input belongs to at most one base mapping. That rule is
//!   enforced by [`crate::conflict`], which every binding edit goes through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use crate::button_mode::{ButtonMode, ModeTimings};
use crate::curve::AxisCurve;

/// Physical control category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputType {
    Axis,
    Button,
    Hat,
}

/// One physical control on one device.
///
/// Identity is `(device_id, kind, index)`; `device_name` is display-only and
/// ignored by equality and hashing so a renamed device still matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSource {
    /// Stable device identity (GUID), survives reconnection.
    pub device_id: String,
    pub device_name: String,
    pub kind: InputType,
    /// Device-local channel index.
    pub index: u16,
}

impl InputSource {
    pub fn new(
        device_id: impl Into<String>,
        device_name: impl Into<String>,
        kind: InputType,
        index: u16,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            device_name: device_name.into(),
            kind,
            index,
        }
    }

    pub fn axis(device_id: impl Into<String>, index: u16) -> Self {
        Self::new(device_id, "", InputType::Axis, index)
    }

    pub fn button(device_id: impl Into<String>, index: u16) -> Self {
        Self::new(device_id, "", InputType::Button, index)
    }

    pub fn hat(device_id: impl Into<String>, index: u16) -> Self {
        Self::new(device_id, "", InputType::Hat, index)
    }
}

impl PartialEq for InputSource {
    fn eq(&self, other: &Self) -> bool {
        self.device_id == other.device_id && self.kind == other.kind && self.index == other.index
    }
}

impl Eq for InputSource {}

impl Hash for InputSource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.device_id.hash(state);
        self.kind.hash(state);
        self.index.hash(state);
    }
}

/// Axis slots on a virtual joystick, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AxisSlot {
    X,
    Y,
    Z,
    RX,
    RY,
    RZ,
    Slider0,
    Slider1,
}

impl AxisSlot {
    pub const ALL: [AxisSlot; 8] = [
        AxisSlot::X,
        AxisSlot::Y,
        AxisSlot::Z,
        AxisSlot::RX,
        AxisSlot::RY,
        AxisSlot::RZ,
        AxisSlot::Slider0,
        AxisSlot::Slider1,
    ];

    pub fn index(self) -> u16 {
        self as u16
    }

    pub fn from_index(idx: u16) -> Option<Self> {
        Self::ALL.get(idx as usize).copied()
    }

    pub fn display_name(self) -> &'static str {
        match self {
            AxisSlot::X => "X",
            AxisSlot::Y => "Y",
            AxisSlot::Z => "Z",
            AxisSlot::RX => "RX",
            AxisSlot::RY => "RY",
            AxisSlot::RZ => "RZ",
            AxisSlot::Slider0 => "Slider 0",
            AxisSlot::Slider1 => "Slider 1",
        }
    }
}

/// Where a mapping writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutputTarget {
    VirtualAxis { device: u8, slot: AxisSlot },
    VirtualButton { device: u8, index: u16 },
    VirtualPov { device: u8, index: u16 },
    /// Keystroke output. Occupies the same slot as `VirtualButton { device, index }`.
    Keyboard {
        device: u8,
        index: u16,
        key: String,
        #[serde(default)]
        modifiers: Vec<String>,
    },
}

impl OutputTarget {
    pub fn device(&self) -> u8 {
        match self {
            OutputTarget::VirtualAxis { device, .. }
            | OutputTarget::VirtualButton { device, .. }
            | OutputTarget::VirtualPov { device, .. }
            | OutputTarget::Keyboard { device, .. } => *device,
        }
    }

    pub fn index(&self) -> u16 {
        match self {
            OutputTarget::VirtualAxis { slot, .. } => slot.index(),
            OutputTarget::VirtualButton { index, .. }
            | OutputTarget::VirtualPov { index, .. }
            | OutputTarget::Keyboard { index, .. } => *index,
        }
    }

    pub fn slot_kind(&self) -> SlotKind {
        match self {
            OutputTarget::VirtualAxis { .. } => SlotKind::Axis,
            OutputTarget::VirtualButton { .. } | OutputTarget::Keyboard { .. } => SlotKind::Button,
            OutputTarget::VirtualPov { .. } => SlotKind::Pov,
        }
    }

    pub fn slot(&self) -> SlotKey {
        SlotKey {
            kind: self.slot_kind(),
            device: self.device(),
            index: self.index(),
        }
    }
}

/// Kind of output slot. Buttons and keyboard outputs share [`SlotKind::Button`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SlotKind {
    Axis,
    Button,
    Pov,
}

impl SlotKind {
    /// Physical input kind that can feed this slot kind.
    pub fn input_type(self) -> InputType {
        match self {
            SlotKind::Axis => InputType::Axis,
            SlotKind::Button => InputType::Button,
            SlotKind::Pov => InputType::Hat,
        }
    }
}

/// Identity of an output slot on a virtual device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub kind: SlotKind,
    pub device: u8,
    pub index: u16,
}

impl SlotKey {
    pub fn axis(device: u8, slot: AxisSlot) -> Self {
        Self {
            kind: SlotKind::Axis,
            device,
            index: slot.index(),
        }
    }

    pub fn button(device: u8, index: u16) -> Self {
        Self {
            kind: SlotKind::Button,
            device,
            index,
        }
    }

    pub fn pov(device: u8, index: u16) -> Self {
        Self {
            kind: SlotKind::Pov,
            device,
            index,
        }
    }
}

pub const PULSE_MS_RANGE: (u32, u32) = (100, 1000);
pub const HOLD_MS_RANGE: (u32, u32) = (200, 2000);

fn default_pulse_ms() -> u32 {
    200
}

fn default_hold_ms() -> u32 {
    500
}

fn default_true() -> bool {
    true
}

/// Physical axes → one virtual axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisMapping {
    pub name: String,
    pub inputs: Vec<InputSource>,
    pub output: OutputTarget,
    #[serde(default)]
    pub curve: AxisCurve,
}

/// Physical buttons → one virtual button or keystroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonMapping {
    pub name: String,
    pub inputs: Vec<InputSource>,
    pub output: OutputTarget,
    #[serde(default)]
    pub mode: ButtonMode,
    #[serde(default = "default_pulse_ms")]
    pub pulse_duration_ms: u32,
    #[serde(default = "default_hold_ms")]
    pub hold_duration_ms: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ButtonMapping {
    pub fn new(name: impl Into<String>, input: InputSource, output: OutputTarget) -> Self {
        Self {
            name: name.into(),
            inputs: vec![input],
            output,
            mode: ButtonMode::Normal,
            pulse_duration_ms: default_pulse_ms(),
            hold_duration_ms: default_hold_ms(),
            enabled: true,
        }
    }

    pub fn with_mode(mut self, mode: ButtonMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the pulse length, clamped to the supported range.
    pub fn set_pulse_duration_ms(&mut self, ms: u32) {
        self.pulse_duration_ms = ms.clamp(PULSE_MS_RANGE.0, PULSE_MS_RANGE.1);
    }

    /// Set the hold threshold, clamped to the supported range.
    pub fn set_hold_duration_ms(&mut self, ms: u32) {
        self.hold_duration_ms = ms.clamp(HOLD_MS_RANGE.0, HOLD_MS_RANGE.1);
    }

    /// Pulse and hold durations as the engine runs them. The public fields can
    /// be written directly, so they are clamped again here.
    pub fn timings(&self) -> ModeTimings {
        ModeTimings::from_ms(
            self.pulse_duration_ms.clamp(PULSE_MS_RANGE.0, PULSE_MS_RANGE.1),
            self.hold_duration_ms.clamp(HOLD_MS_RANGE.0, HOLD_MS_RANGE.1),
        )
    }
}

/// Physical hats → one virtual POV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HatMapping {
    pub name: String,
    pub inputs: Vec<InputSource>,
    pub output: OutputTarget,
    #[serde(default)]
    pub use_continuous: bool,
}

/// Alternate button mappings active while `activator` is held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftLayer {
    pub name: String,
    pub activator: InputSource,
    #[serde(default)]
    pub button_mappings: Vec<ButtonMapping>,
}

impl ShiftLayer {
    pub fn new(name: impl Into<String>, activator: InputSource) -> Self {
        Self {
            name: name.into(),
            activator,
            button_mappings: Vec::new(),
        }
    }
}

/// The aggregate root of all bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub axis_mappings: Vec<AxisMapping>,
    #[serde(default)]
    pub button_mappings: Vec<ButtonMapping>,
    #[serde(default)]
    pub hat_mappings: Vec<HatMapping>,
    #[serde(default)]
    pub shift_layers: Vec<ShiftLayer>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Default for MappingProfile {
    fn default() -> Self {
        Self::new("")
    }
}

/// Borrowed view of any mapping in a profile.
#[derive(Debug, Clone, Copy)]
pub enum MappingRef<'a> {
    Axis(&'a AxisMapping),
    Button(&'a ButtonMapping),
    Hat(&'a HatMapping),
}

impl MappingRef<'_> {
    pub fn name(&self) -> &str {
        match self {
            MappingRef::Axis(m) => &m.name,
            MappingRef::Button(m) => &m.name,
            MappingRef::Hat(m) => &m.name,
        }
    }

    pub fn inputs(&self) -> &[InputSource] {
        match self {
            MappingRef::Axis(m) => &m.inputs,
            MappingRef::Button(m) => &m.inputs,
            MappingRef::Hat(m) => &m.inputs,
        }
    }

    pub fn slot(&self) -> SlotKey {
        match self {
            MappingRef::Axis(m) => m.output.slot(),
            MappingRef::Button(m) => m.output.slot(),
            MappingRef::Hat(m) => m.output.slot(),
        }
    }
}

impl MappingProfile {
    /// Empty profile stamped with the current time.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            axis_mappings: Vec::new(),
            button_mappings: Vec::new(),
            hat_mappings: Vec::new(),
            shift_layers: Vec::new(),
            created_at: now,
            modified_at: now,
        }
    }

    /// Record a mutation.
    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }

    /// All base mappings, axis then button then hat.
    pub fn mappings(&self) -> impl Iterator<Item = MappingRef<'_>> {
        self.axis_mappings
            .iter()
            .map(MappingRef::Axis)
            .chain(self.button_mappings.iter().map(MappingRef::Button))
            .chain(self.hat_mappings.iter().map(MappingRef::Hat))
    }

    pub fn mapping_count(&self) -> usize {
        self.axis_mappings.len() + self.button_mappings.len() + self.hat_mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping_count() == 0
    }

    /// Look up the mapping owning an output slot.
    pub fn mapping(&self, slot: &SlotKey) -> Option<MappingRef<'_>> {
        match slot.kind {
            SlotKind::Axis => self.axis(slot).map(MappingRef::Axis),
            SlotKind::Button => self.button(slot).map(MappingRef::Button),
            SlotKind::Pov => self.hat(slot).map(MappingRef::Hat),
        }
    }

    pub fn axis(&self, slot: &SlotKey) -> Option<&AxisMapping> {
        self.axis_mappings.iter().find(|m| m.output.slot() == *slot)
    }

    pub fn axis_mut(&mut self, slot: &SlotKey) -> Option<&mut AxisMapping> {
        self.axis_mappings.iter_mut().find(|m| m.output.slot() == *slot)
    }

    pub fn button(&self, slot: &SlotKey) -> Option<&ButtonMapping> {
        self.button_mappings.iter().find(|m| m.output.slot() == *slot)
    }

    pub fn button_mut(&mut self, slot: &SlotKey) -> Option<&mut ButtonMapping> {
        self.button_mappings.iter_mut().find(|m| m.output.slot() == *slot)
    }

    pub fn hat(&self, slot: &SlotKey) -> Option<&HatMapping> {
        self.hat_mappings.iter().find(|m| m.output.slot() == *slot)
    }

    pub fn hat_mut(&mut self, slot: &SlotKey) -> Option<&mut HatMapping> {
        self.hat_mappings.iter_mut().find(|m| m.output.slot() == *slot)
    }

    /// Insert or replace the axis mapping for `mapping.output`'s slot.
    ///
    /// Returns the mapping previously at that slot, if any. Callers adding
    /// physical inputs should go through [`crate::conflict::bind_input`] so
    /// input ownership stays unique.
    pub fn upsert_axis(&mut self, mapping: AxisMapping) -> Option<AxisMapping> {
        self.touch();
        let slot = mapping.output.slot();
        match self.axis_mappings.iter_mut().find(|m| m.output.slot() == slot) {
            Some(existing) => Some(std::mem::replace(existing, mapping)),
            None => {
                self.axis_mappings.push(mapping);
                None
            }
        }
    }

    /// Insert or replace the button mapping for `mapping.output`'s slot.
    ///
    /// A keyboard mapping replaces a virtual-button mapping on the same slot
    /// and vice versa.
    pub fn upsert_button(&mut self, mapping: ButtonMapping) -> Option<ButtonMapping> {
        self.touch();
        let slot = mapping.output.slot();
        match self.button_mappings.iter_mut().find(|m| m.output.slot() == slot) {
            Some(existing) => Some(std::mem::replace(existing, mapping)),
            None => {
                self.button_mappings.push(mapping);
                None
            }
        }
    }

    /// Insert or replace the hat mapping for `mapping.output`'s slot.
    pub fn upsert_hat(&mut self, mapping: HatMapping) -> Option<HatMapping> {
        self.touch();
        let slot = mapping.output.slot();
        match self.hat_mappings.iter_mut().find(|m| m.output.slot() == slot) {
            Some(existing) => Some(std::mem::replace(existing, mapping)),
            None => {
                self.hat_mappings.push(mapping);
                None
            }
        }
    }

    /// Remove whatever mapping owns `slot`. Returns whether one existed.
    pub fn remove_mapping(&mut self, slot: &SlotKey) -> bool {
        let before = self.mapping_count();
        match slot.kind {
            SlotKind::Axis => self.axis_mappings.retain(|m| m.output.slot() != *slot),
            SlotKind::Button => self.button_mappings.retain(|m| m.output.slot() != *slot),
            SlotKind::Pov => self.hat_mappings.retain(|m| m.output.slot() != *slot),
        }
        let removed = self.mapping_count() != before;
        if removed {
            self.touch();
        }
        removed
    }

    pub fn layer(&self, name: &str) -> Option<&ShiftLayer> {
        self.shift_layers.iter().find(|l| l.name == name)
    }

    pub fn layer_mut(&mut self, name: &str) -> Option<&mut ShiftLayer> {
        self.shift_layers.iter_mut().find(|l| l.name == name)
    }

    /// Add a shift layer, replacing one with the same name.
    pub fn upsert_layer(&mut self, layer: ShiftLayer) {
        self.touch();
        match self.shift_layers.iter_mut().find(|l| l.name == layer.name) {
            Some(existing) => *existing = layer,
            None => self.shift_layers.push(layer),
        }
    }

    pub fn remove_layer(&mut self, name: &str) -> bool {
        let before = self.shift_layers.len();
        self.shift_layers.retain(|l| l.name != name);
        let removed = self.shift_layers.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    /// Distinct physical device ids referenced by base mappings.
    pub fn device_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for m in self.mappings() {
            for input in m.inputs() {
                if !ids.contains(&input.device_id) {
                    ids.push(input.device_id.clone());
                }
            }
        }
        ids
    }
}
