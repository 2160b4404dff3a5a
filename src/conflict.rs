//! Binding conflict resolution.
//!
//! A physical input may feed at most one base mapping. Binding an input that
//! is already in use is a three-step, order-sensitive sequence:
//!
//! 1. [`find_owner`] locates the mapping currently using the input;
//! 2. the caller confirms the replacement (declining leaves the profile untouched);
//! 3. [`remove_input`] detaches the input from its old owner **before** it is
//!    inserted into the new mapping, so no moment exists where two mappings own it.
//!
//! [`bind_input`] runs the whole sequence.

use std::collections::HashSet;

use tracing::debug;

use crate::binding::{
    AxisMapping, ButtonMapping, HatMapping, InputSource, MappingProfile, OutputTarget, SlotKey,
    SlotKind,
};
use crate::curve::AxisCurve;
use crate::error::{MapError, Result};

/// The mapping that currently uses an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    pub name: String,
    pub slot: SlotKey,
}

/// Result of [`remove_input`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub owner: Owner,
    /// The owner had no inputs left and was deleted.
    pub mapping_deleted: bool,
}

/// Outcome of [`bind_input`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    /// Input inserted. `replaced` names the mapping it was taken from.
    Bound { replaced: Option<Owner> },
    /// The target mapping already had this input; nothing changed.
    AlreadyBound,
    /// Caller refused to take the input from its owner; nothing changed.
    Declined,
}

/// A mapping to create if its slot is empty. Any inputs on the template are ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum MappingDraft {
    Axis(AxisMapping),
    Button(ButtonMapping),
    Hat(HatMapping),
}

impl MappingDraft {
    pub fn axis(name: impl Into<String>, output: OutputTarget, curve: AxisCurve) -> Self {
        MappingDraft::Axis(AxisMapping {
            name: name.into(),
            inputs: Vec::new(),
            output,
            curve,
        })
    }

    pub fn button(template: ButtonMapping) -> Self {
        MappingDraft::Button(ButtonMapping {
            inputs: Vec::new(),
            ..template
        })
    }

    pub fn hat(name: impl Into<String>, output: OutputTarget, use_continuous: bool) -> Self {
        MappingDraft::Hat(HatMapping {
            name: name.into(),
            inputs: Vec::new(),
            output,
            use_continuous,
        })
    }

    /// Output slot of the draft, checking the output type fits the mapping kind.
    pub fn slot(&self) -> Result<SlotKey> {
        let (output, expected) = match self {
            MappingDraft::Axis(m) => (&m.output, SlotKind::Axis),
            MappingDraft::Button(m) => (&m.output, SlotKind::Button),
            MappingDraft::Hat(m) => (&m.output, SlotKind::Pov),
        };
        let slot = output.slot();
        if slot.kind != expected {
            return Err(MapError::OutputKindMismatch(slot));
        }
        Ok(slot)
    }
}

/// Where [`bind_input`] puts the input.
#[derive(Debug, Clone, PartialEq)]
pub enum BindTarget {
    /// Append to the mapping that owns this slot; it must exist.
    Existing(SlotKey),
    /// Append to the mapping at the draft's slot, creating it from the draft if empty.
    New(MappingDraft),
}

impl BindTarget {
    fn slot(&self) -> Result<SlotKey> {
        match self {
            BindTarget::Existing(slot) => Ok(*slot),
            BindTarget::New(draft) => draft.slot(),
        }
    }
}

/// Find the base mapping whose inputs contain `input`.
pub fn find_owner(profile: &MappingProfile, input: &InputSource) -> Option<Owner> {
    profile
        .mappings()
        .find(|m| m.inputs().contains(input))
        .map(|m| Owner {
            name: m.name().to_string(),
            slot: m.slot(),
        })
}

/// Detach `input` from whichever base mapping owns it.
///
/// A mapping left without inputs is deleted.
pub fn remove_input(profile: &mut MappingProfile, input: &InputSource) -> Option<Removal> {
    let owner = find_owner(profile, input)?;

    let remaining = match owner.slot.kind {
        SlotKind::Axis => profile.axis_mut(&owner.slot).map(|m| detach(&mut m.inputs, input)),
        SlotKind::Button => profile.button_mut(&owner.slot).map(|m| detach(&mut m.inputs, input)),
        SlotKind::Pov => profile.hat_mut(&owner.slot).map(|m| detach(&mut m.inputs, input)),
    }
    .unwrap_or(0);

    let mapping_deleted = remaining == 0;
    if mapping_deleted {
        profile.remove_mapping(&owner.slot);
    }
    profile.touch();

    debug!(
        mapping = %owner.name,
        deleted = mapping_deleted,
        "removed input {}:{:?}{}",
        input.device_id,
        input.kind,
        input.index
    );

    Some(Removal {
        owner,
        mapping_deleted,
    })
}

fn detach(inputs: &mut Vec<InputSource>, input: &InputSource) -> usize {
    inputs.retain(|i| i != input);
    inputs.len()
}

/// Bind `input` into `target`, resolving ownership conflicts.
///
/// `confirm` is asked only when another mapping owns the input. Declining
/// returns [`BindOutcome::Declined`] and leaves the profile untouched, as do
/// all error returns.
pub fn bind_input<F>(
    profile: &mut MappingProfile,
    target: BindTarget,
    input: InputSource,
    confirm: F,
) -> Result<BindOutcome>
where
    F: FnOnce(&Owner) -> bool,
{
    let slot = target.slot()?;
    if slot.kind.input_type() != input.kind {
        return Err(MapError::InputKindMismatch {
            input: input.kind,
            slot,
        });
    }
    if matches!(target, BindTarget::Existing(_)) && profile.mapping(&slot).is_none() {
        return Err(MapError::UnknownMapping(slot));
    }

    let owner = find_owner(profile, &input);
    if let Some(owner) = &owner {
        if owner.slot == slot {
            return Ok(BindOutcome::AlreadyBound);
        }
        if !confirm(owner) {
            debug!(owner = %owner.name, "bind declined");
            return Ok(BindOutcome::Declined);
        }
        remove_input(profile, &input);
    }

    insert(profile, target, slot, input);
    Ok(BindOutcome::Bound { replaced: owner })
}

fn insert(profile: &mut MappingProfile, target: BindTarget, slot: SlotKey, input: InputSource) {
    profile.touch();
    match target {
        BindTarget::Existing(_) => match slot.kind {
            SlotKind::Axis => {
                if let Some(m) = profile.axis_mut(&slot) {
                    m.inputs.push(input);
                }
            }
            SlotKind::Button => {
                if let Some(m) = profile.button_mut(&slot) {
                    m.inputs.push(input);
                }
            }
            SlotKind::Pov => {
                if let Some(m) = profile.hat_mut(&slot) {
                    m.inputs.push(input);
                }
            }
        },
        BindTarget::New(MappingDraft::Axis(draft)) => match profile.axis_mut(&slot) {
            Some(m) => m.inputs.push(input),
            None => {
                profile.upsert_axis(AxisMapping {
                    inputs: vec![input],
                    ..draft
                });
            }
        },
        BindTarget::New(MappingDraft::Button(draft)) => match profile.button_mut(&slot) {
            Some(m) => {
                // Slot is either keyboard or virtual button, never both.
                m.output = draft.output;
                m.inputs.push(input);
            }
            None => {
                profile.upsert_button(ButtonMapping {
                    inputs: vec![input],
                    ..draft
                });
            }
        },
        BindTarget::New(MappingDraft::Hat(draft)) => match profile.hat_mut(&slot) {
            Some(m) => m.inputs.push(input),
            None => {
                profile.upsert_hat(HatMapping {
                    inputs: vec![input],
                    ..draft
                });
            }
        },
    }
}

/// Put `mapping` into a shift layer.
///
/// Inputs are unique within a layer: they are stripped from the layer's other
/// mappings first (emptied mappings are dropped), then the mapping replaces
/// whatever the layer had on the same slot.
///
/// Refuses mappings that would not survive a profile reload: no inputs, an
/// input listed twice, or the layer's own activator as an input. Durations are
/// clamped to their valid ranges.
pub fn bind_layer_mapping(
    profile: &mut MappingProfile,
    layer: &str,
    mut mapping: ButtonMapping,
) -> Result<Option<ButtonMapping>> {
    let slot = mapping.output.slot();
    if slot.kind != SlotKind::Button {
        return Err(MapError::OutputKindMismatch(slot));
    }
    if mapping.inputs.is_empty() {
        return Err(MapError::NoInputs);
    }
    let mut seen = HashSet::new();
    for input in &mapping.inputs {
        if input.kind != slot.kind.input_type() {
            return Err(MapError::InputKindMismatch {
                input: input.kind,
                slot,
            });
        }
        if !seen.insert(input) {
            return Err(MapError::DuplicateInput(input.clone()));
        }
    }

    let shift = profile
        .layer_mut(layer)
        .ok_or_else(|| MapError::UnknownLayer(layer.to_string()))?;
    if mapping.inputs.contains(&shift.activator) {
        return Err(MapError::ActivatorInput(shift.name.clone()));
    }
    let (pulse, hold) = (mapping.pulse_duration_ms, mapping.hold_duration_ms);
    mapping.set_pulse_duration_ms(pulse);
    mapping.set_hold_duration_ms(hold);

    for other in shift.button_mappings.iter_mut() {
        if other.output.slot() != slot {
            other.inputs.retain(|i| !mapping.inputs.contains(i));
        }
    }
    shift.button_mappings.retain(|m| !m.inputs.is_empty() || m.output.slot() == slot);

    let previous = match shift
        .button_mappings
        .iter_mut()
        .find(|m| m.output.slot() == slot)
    {
        Some(existing) => Some(std::mem::replace(existing, mapping)),
        None => {
            shift.button_mappings.push(mapping);
            None
        }
    };
    profile.touch();
    Ok(previous)
}
