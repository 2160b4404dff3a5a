//! Automatic "1:1" assignment of a physical device onto a virtual joystick.
//!
//! Axes are matched by *type* first (a physical `RZ` lands on virtual `RZ`,
//! sliders fill `Slider0` then `Slider1`), and only then by position: any axis
//! that could not be placed by type takes the first free virtual axis slot.
//! Buttons and hats map index to index.
//!
//! Running out of virtual capacity is a partial success. Whatever fits is
//! mapped and the rest is reported as [`Unmapped`] counts.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::binding::{AxisSlot, ButtonMapping, InputSource, InputType, MappingProfile, OutputTarget};
use crate::conflict::{bind_input, remove_input, BindTarget, MappingDraft};
use crate::curve::AxisCurve;
use crate::device::{DeviceInventory, PhysicalAxisType};

/// Output capacity of one virtual joystick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualCapacity {
    pub device: u8,
    /// Axis slots the device exposes. Order does not matter.
    pub axes: Vec<AxisSlot>,
    pub button_count: u16,
    #[serde(default)]
    pub cont_pov_count: u16,
    #[serde(default)]
    pub disc_pov_count: u16,
}

impl VirtualCapacity {
    /// A device exposing every axis slot.
    pub fn full(device: u8, button_count: u16, cont_pov_count: u16, disc_pov_count: u16) -> Self {
        Self {
            device,
            axes: AxisSlot::ALL.to_vec(),
            button_count,
            cont_pov_count,
            disc_pov_count,
        }
    }

    pub fn has_axis(&self, slot: AxisSlot) -> bool {
        self.axes.contains(&slot)
    }

    /// Present axis slots in canonical order `X, Y, Z, RX, RY, RZ, Slider0, Slider1`.
    pub fn available_axes(&self) -> Vec<AxisSlot> {
        AxisSlot::ALL
            .into_iter()
            .filter(|s| self.has_axis(*s))
            .collect()
    }

    pub fn pov_count(&self) -> u16 {
        self.cont_pov_count + self.disc_pov_count
    }

    pub fn total(&self) -> u32 {
        self.available_axes().len() as u32 + self.button_count as u32 + self.pov_count() as u32
    }

    /// Whether every dimension covers the physical device.
    pub fn covers(&self, inv: &DeviceInventory) -> bool {
        self.available_axes().len() >= inv.axis_count()
            && self.button_count >= inv.button_count
            && self.pov_count() >= inv.hat_count
    }

    /// Controls of `inv` that do not fit, summed over all dimensions.
    fn shortfall(&self, inv: &DeviceInventory) -> u32 {
        let axes = inv.axis_count().saturating_sub(self.available_axes().len()) as u32;
        let buttons = inv.button_count.saturating_sub(self.button_count) as u32;
        let hats = inv.hat_count.saturating_sub(self.pov_count()) as u32;
        axes + buttons + hats
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisAssignment {
    pub physical: u16,
    pub slot: AxisSlot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonAssignment {
    pub physical: u16,
    pub virtual_index: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HatAssignment {
    pub physical: u16,
    pub pov: u16,
    pub continuous: bool,
}

/// Physical controls left without a virtual counterpart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unmapped {
    pub axes: usize,
    pub buttons: usize,
    pub hats: usize,
}

impl Unmapped {
    pub fn total(&self) -> usize {
        self.axes + self.buttons + self.hats
    }
}

/// Full set of assignments for one physical device on one virtual device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentPlan {
    pub device: u8,
    pub axes: Vec<AxisAssignment>,
    pub buttons: Vec<ButtonAssignment>,
    pub hats: Vec<HatAssignment>,
    pub unmapped: Unmapped,
}

/// Which virtual device to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceChoice {
    pub device: u8,
    /// `false` when no candidate covers the physical device; the plan will be partial.
    pub fits: bool,
}

/// Summary returned after applying a plan to a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoAssignReport {
    pub device: u8,
    /// Set when the target could not hold every control.
    pub partial: bool,
    pub created: usize,
    /// Inputs of this physical device detached from earlier mappings on the target.
    pub cleared: usize,
    /// Mappings fed by other devices that were replaced on a target slot.
    pub displaced: usize,
    pub unmapped: Unmapped,
}

fn preferred_slots(ty: PhysicalAxisType) -> &'static [AxisSlot] {
    match ty {
        PhysicalAxisType::X => &[AxisSlot::X],
        PhysicalAxisType::Y => &[AxisSlot::Y],
        PhysicalAxisType::Z => &[AxisSlot::Z],
        PhysicalAxisType::RX => &[AxisSlot::RX],
        PhysicalAxisType::RY => &[AxisSlot::RY],
        PhysicalAxisType::RZ => &[AxisSlot::RZ],
        PhysicalAxisType::Slider => &[AxisSlot::Slider0, AxisSlot::Slider1],
        PhysicalAxisType::Unknown => &[],
    }
}

/// Build the assignment plan for `inv` on `cap`.
pub fn plan(inv: &DeviceInventory, cap: &VirtualCapacity) -> AssignmentPlan {
    let available = cap.available_axes();
    let mut claimed: Vec<AxisSlot> = Vec::with_capacity(available.len());
    let mut placed: Vec<Option<AxisSlot>> = vec![None; inv.axis_count()];

    // Typed axes claim their own slot first.
    for (i, ty) in inv.axis_types.iter().enumerate() {
        placed[i] = preferred_slots(*ty)
            .iter()
            .copied()
            .find(|s| available.contains(s) && !claimed.contains(s));
        if let Some(slot) = placed[i] {
            claimed.push(slot);
        }
    }

    // Everything else takes the first free slot in canonical order.
    for slot in placed.iter_mut().filter(|p| p.is_none()) {
        *slot = available.iter().copied().find(|s| !claimed.contains(s));
        if let Some(s) = *slot {
            claimed.push(s);
        }
    }

    let axes: Vec<AxisAssignment> = placed
        .iter()
        .enumerate()
        .filter_map(|(i, s)| {
            s.map(|slot| AxisAssignment {
                physical: i as u16,
                slot,
            })
        })
        .collect();

    let buttons: Vec<ButtonAssignment> = (0..inv.button_count.min(cap.button_count))
        .map(|i| ButtonAssignment {
            physical: i,
            virtual_index: i,
        })
        .collect();

    let hats: Vec<HatAssignment> = (0..inv.hat_count.min(cap.pov_count()))
        .map(|i| HatAssignment {
            physical: i,
            pov: i,
            continuous: i < cap.cont_pov_count,
        })
        .collect();

    let unmapped = Unmapped {
        axes: inv.axis_count() - axes.len(),
        buttons: inv.button_count as usize - buttons.len(),
        hats: inv.hat_count as usize - hats.len(),
    };

    AssignmentPlan {
        device: cap.device,
        axes,
        buttons,
        hats,
        unmapped,
    }
}

/// Pick the virtual device for `inv`.
///
/// Among devices covering every dimension, the one with the smallest surplus
/// wins. If none covers it, the one with the smallest shortfall is returned with
/// `fits = false`. Ties go to the lowest device id. `None` only for an empty list.
pub fn select_device(
    inv: &DeviceInventory,
    candidates: &[VirtualCapacity],
) -> Option<DeviceChoice> {
    let required = inv.total();

    let best_fit = candidates
        .iter()
        .filter(|c| c.covers(inv))
        .min_by_key(|c| (c.total().saturating_sub(required), c.device));
    if let Some(c) = best_fit {
        return Some(DeviceChoice {
            device: c.device,
            fits: true,
        });
    }

    candidates
        .iter()
        .min_by_key(|c| (c.shortfall(inv), c.device))
        .map(|c| DeviceChoice {
            device: c.device,
            fits: false,
        })
}

/// Choose a device, plan, and apply the plan to `profile`.
pub fn auto_assign(
    profile: &mut MappingProfile,
    inv: &DeviceInventory,
    candidates: &[VirtualCapacity],
) -> Option<AutoAssignReport> {
    let choice = select_device(inv, candidates)?;
    let cap = candidates.iter().find(|c| c.device == choice.device)?;
    if !choice.fits {
        warn!(
            device = %inv.device_name,
            vjoy = choice.device,
            "no virtual device covers every control, mapping what fits"
        );
    }
    let plan = plan(inv, cap);
    Some(apply_plan(profile, inv, &plan))
}

/// Write `plan` into `profile`.
///
/// Earlier mappings from this physical device on the same virtual device are
/// cleared first, so re-running is idempotent. A target slot held by another
/// device's mapping is replaced and counted as displaced.
pub fn apply_plan(
    profile: &mut MappingProfile,
    inv: &DeviceInventory,
    plan: &AssignmentPlan,
) -> AutoAssignReport {
    let mut report = AutoAssignReport {
        device: plan.device,
        partial: plan.unmapped.total() > 0,
        created: 0,
        cleared: clear_device(profile, &inv.device_id, plan.device),
        displaced: 0,
        unmapped: plan.unmapped,
    };

    let source = |kind: InputType, index: u16| {
        InputSource::new(inv.device_id.clone(), inv.device_name.clone(), kind, index)
    };

    for a in &plan.axes {
        let output = OutputTarget::VirtualAxis {
            device: plan.device,
            slot: a.slot,
        };
        let name = format!(
            "{} Axis {} → {}",
            inv.device_name,
            a.physical,
            a.slot.display_name()
        );
        let draft = MappingDraft::axis(name, output, AxisCurve::default());
        place(profile, &mut report, draft, source(InputType::Axis, a.physical));
    }

    for b in &plan.buttons {
        let output = OutputTarget::VirtualButton {
            device: plan.device,
            index: b.virtual_index,
        };
        let name = format!("{} Button {}", inv.device_name, b.physical);
        let input = source(InputType::Button, b.physical);
        let draft = MappingDraft::button(ButtonMapping::new(name, input.clone(), output));
        place(profile, &mut report, draft, input);
    }

    for h in &plan.hats {
        let output = OutputTarget::VirtualPov {
            device: plan.device,
            index: h.pov,
        };
        let name = format!("{} Hat {}", inv.device_name, h.physical);
        let draft = MappingDraft::hat(name, output, h.continuous);
        place(profile, &mut report, draft, source(InputType::Hat, h.physical));
    }

    info!(
        device = %inv.device_name,
        vjoy = plan.device,
        created = report.created,
        cleared = report.cleared,
        displaced = report.displaced,
        unmapped = plan.unmapped.total(),
        "auto-assignment applied"
    );
    report
}

/// Replace whatever holds the draft's slot with a fresh mapping fed by `input`.
fn place(
    profile: &mut MappingProfile,
    report: &mut AutoAssignReport,
    draft: MappingDraft,
    input: InputSource,
) {
    let Ok(slot) = draft.slot() else {
        return;
    };
    if profile.remove_mapping(&slot) {
        debug!("auto-assignment displaced the mapping on {slot:?}");
        report.displaced += 1;
    }
    match bind_input(profile, BindTarget::New(draft), input, |_| true) {
        Ok(_) => report.created += 1,
        Err(e) => warn!("auto-assignment skipped {slot:?}: {e}"),
    }
}

/// Detach every input of `device_id` from mappings that write to `vjoy`.
fn clear_device(profile: &mut MappingProfile, device_id: &str, vjoy: u8) -> usize {
    let stale: Vec<InputSource> = profile
        .mappings()
        .filter(|m| m.slot().device == vjoy)
        .flat_map(|m| {
            m.inputs()
                .iter()
                .filter(|i| i.device_id == device_id)
                .cloned()
                .collect::<Vec<_>>()
        })
        .collect();
    for input in &stale {
        remove_input(profile, input);
    }
    stale.len()
}
