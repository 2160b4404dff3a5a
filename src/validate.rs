//! Load-time profile checking.
//!
//! A profile from disk may have been edited by hand or written by an older
//! version. [`sanitize`] walks every mapping individually: fixable problems are
//! repaired in place, mappings that cannot be made meaningful are dropped, and
//! both are counted in the returned [`RepairReport`]. One bad mapping never
//! costs the rest of the profile.
//!
//! Repaired: deadzone order/range, curve control points, out-of-range
//! durations, inputs of the wrong kind, duplicate inputs, inputs already owned
//! by an earlier mapping. Rejected: wrong output kind, duplicate output slot,
//! no usable inputs left.

use std::collections::HashSet;
use tracing::warn;

use crate::binding::{
    ButtonMapping, InputSource, InputType, MappingProfile, OutputTarget, SlotKey, SlotKind,
};
use crate::curve::AxisCurve;

/// What [`sanitize`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Mappings kept after at least one fix.
    pub repaired: usize,
    /// Mappings (or layers) dropped.
    pub rejected: usize,
    /// One line per problem found, for display.
    pub issues: Vec<String>,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.repaired == 0 && self.rejected == 0
    }

    /// Combine two reports (e.g. decode-time and sanitize-time).
    pub fn merge(&mut self, other: RepairReport) {
        self.repaired += other.repaired;
        self.rejected += other.rejected;
        self.issues.extend(other.issues);
    }

    pub(crate) fn reject(&mut self, issue: String) {
        warn!("{issue}");
        self.rejected += 1;
        self.issues.push(issue);
    }

    fn note(&mut self, issue: String) {
        warn!("{issue}");
        self.issues.push(issue);
    }
}

/// Ownership bookkeeping for one namespace (the base profile, or one layer).
#[derive(Default)]
struct Checker {
    claimed: HashSet<InputSource>,
    slots: HashSet<SlotKey>,
}

impl Checker {
    /// Check the parts every mapping kind shares. Returns whether to keep it.
    fn admit(
        &mut self,
        report: &mut RepairReport,
        name: &str,
        output: &OutputTarget,
        expected: SlotKind,
        inputs: &mut Vec<InputSource>,
        mut fixed: bool,
    ) -> bool {
        let slot = output.slot();
        if slot.kind != expected {
            report.reject(format!("{name}: {:?} output on a {expected:?} mapping", slot.kind));
            return false;
        }
        if self.slots.contains(&slot) {
            report.reject(format!("{name}: slot {slot:?} already mapped"));
            return false;
        }

        let kind = expected.input_type();
        let before = inputs.len();
        let mut seen = HashSet::new();
        inputs.retain(|i| i.kind == kind && !self.claimed.contains(i) && seen.insert(i.clone()));
        if inputs.len() != before {
            report.note(format!("{name}: dropped {} unusable input(s)", before - inputs.len()));
            fixed = true;
        }
        if inputs.is_empty() {
            report.reject(format!("{name}: no inputs"));
            return false;
        }

        self.claimed.extend(inputs.iter().cloned());
        self.slots.insert(slot);
        if fixed {
            report.repaired += 1;
        }
        true
    }
}

fn fix_curve(report: &mut RepairReport, name: &str, curve: &mut AxisCurve) -> bool {
    let mut fixed = false;
    if curve.deadzone.check().is_err() {
        curve.deadzone = curve.deadzone.repaired();
        report.note(format!("{name}: deadzone repaired"));
        fixed = true;
    }
    if !curve.points_valid() {
        curve.repair_points();
        report.note(format!("{name}: curve points repaired"));
        fixed = true;
    }
    fixed
}

fn fix_durations(report: &mut RepairReport, m: &mut ButtonMapping) -> bool {
    let (pulse, hold) = (m.pulse_duration_ms, m.hold_duration_ms);
    m.set_pulse_duration_ms(pulse);
    m.set_hold_duration_ms(hold);
    let fixed = pulse != m.pulse_duration_ms || hold != m.hold_duration_ms;
    if fixed {
        report.note(format!("{}: durations clamped", m.name));
    }
    fixed
}

fn sanitize_buttons(
    report: &mut RepairReport,
    checker: &mut Checker,
    mappings: Vec<ButtonMapping>,
) -> Vec<ButtonMapping> {
    mappings
        .into_iter()
        .filter_map(|mut m| {
            let fixed = fix_durations(report, &mut m);
            checker
                .admit(report, &m.name, &m.output, SlotKind::Button, &mut m.inputs, fixed)
                .then_some(m)
        })
        .collect()
}

/// Repair or drop every malformed mapping in `profile`.
///
/// Earlier mappings win: a later mapping reusing a slot is dropped and a later
/// mapping reusing an input loses that input. Shift layers are checked the
/// same way, each layer as its own namespace.
pub fn sanitize(profile: &mut MappingProfile) -> RepairReport {
    let mut report = RepairReport::default();
    let mut base = Checker::default();

    let axes = std::mem::take(&mut profile.axis_mappings);
    profile.axis_mappings = axes
        .into_iter()
        .filter_map(|mut m| {
            let fixed = fix_curve(&mut report, &m.name, &mut m.curve);
            base.admit(&mut report, &m.name, &m.output, SlotKind::Axis, &mut m.inputs, fixed)
                .then_some(m)
        })
        .collect();

    let buttons = std::mem::take(&mut profile.button_mappings);
    profile.button_mappings = sanitize_buttons(&mut report, &mut base, buttons);

    let hats = std::mem::take(&mut profile.hat_mappings);
    profile.hat_mappings = hats
        .into_iter()
        .filter_map(|mut m| {
            base.admit(&mut report, &m.name, &m.output, SlotKind::Pov, &mut m.inputs, false)
                .then_some(m)
        })
        .collect();

    let layers = std::mem::take(&mut profile.shift_layers);
    let mut names = HashSet::new();
    for mut layer in layers {
        if layer.activator.kind != InputType::Button {
            report.reject(format!("layer {}: activator is not a button", layer.name));
            continue;
        }
        if !names.insert(layer.name.clone()) {
            report.reject(format!("layer {}: duplicate name", layer.name));
            continue;
        }
        let mut checker = Checker::default();
        // Pressing the activator must not also fire a layer mapping.
        checker.claimed.insert(layer.activator.clone());
        let mappings = std::mem::take(&mut layer.button_mappings);
        layer.button_mappings = sanitize_buttons(&mut report, &mut checker, mappings);
        profile.shift_layers.push(layer);
    }

    if !report.is_clean() {
        warn!(
            profile = %profile.name,
            repaired = report.repaired,
            rejected = report.rejected,
            "profile sanitized"
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{AxisMapping, AxisSlot, HatMapping, ShiftLayer};
    use crate::deadzone::Deadzone;

    fn axis(name: &str, inputs: Vec<InputSource>, output: OutputTarget) -> AxisMapping {
        AxisMapping {
            name: name.into(),
            inputs,
            output,
            curve: AxisCurve::default(),
        }
    }

    fn vaxis(slot: AxisSlot) -> OutputTarget {
        OutputTarget::VirtualAxis { device: 1, slot }
    }

    #[test]
    fn test_clean_profile_untouched() {
        let mut p = MappingProfile::new("ok");
        p.axis_mappings.push(axis("x", vec![InputSource::axis("s", 0)], vaxis(AxisSlot::X)));
        p.button_mappings.push(ButtonMapping::new(
            "b",
            InputSource::button("s", 0),
            OutputTarget::VirtualButton { device: 1, index: 0 },
        ));
        let before = p.clone();
        let report = sanitize(&mut p);
        assert!(report.is_clean());
        assert_eq!(p, before);
    }

    #[test]
    fn test_repairs_are_counted_per_mapping() {
        let mut p = MappingProfile::new("fix");
        let mut m = axis("x", vec![InputSource::axis("s", 0)], vaxis(AxisSlot::X));
        m.curve.deadzone = Deadzone {
            min: 0.5,
            center_min: 0.2,
            center_max: -0.2,
            max: -0.5,
            center_enabled: true,
        };
        m.curve.control_points.remove(0);
        p.axis_mappings.push(m);

        let mut b = ButtonMapping::new(
            "b",
            InputSource::button("s", 0),
            OutputTarget::VirtualButton { device: 1, index: 0 },
        );
        b.pulse_duration_ms = 5;
        b.inputs.push(InputSource::axis("s", 3));
        p.button_mappings.push(b);

        let report = sanitize(&mut p);
        assert_eq!(report.repaired, 2);
        assert_eq!(report.rejected, 0);
        assert!(p.axis_mappings[0].curve.deadzone.check().is_ok());
        assert!(p.axis_mappings[0].curve.points_valid());
        assert_eq!(p.button_mappings[0].pulse_duration_ms, 100);
        assert_eq!(p.button_mappings[0].inputs.len(), 1);
    }

    #[test]
    fn test_unrepairable_mappings_rejected() {
        let mut p = MappingProfile::new("bad");
        // Wrong output kind.
        p.axis_mappings.push(axis(
            "pov-axis",
            vec![InputSource::axis("s", 0)],
            OutputTarget::VirtualPov { device: 1, index: 0 },
        ));
        // No inputs.
        p.hat_mappings.push(HatMapping {
            name: "empty".into(),
            inputs: vec![],
            output: OutputTarget::VirtualPov { device: 1, index: 0 },
            use_continuous: false,
        });
        // Duplicate slot.
        p.axis_mappings.push(axis("x1", vec![InputSource::axis("s", 1)], vaxis(AxisSlot::X)));
        p.axis_mappings.push(axis("x2", vec![InputSource::axis("s", 2)], vaxis(AxisSlot::X)));

        let report = sanitize(&mut p);
        assert_eq!(report.rejected, 3);
        assert_eq!(p.axis_mappings.len(), 1);
        assert_eq!(p.axis_mappings[0].name, "x1");
        assert!(p.hat_mappings.is_empty());
    }

    #[test]
    fn test_duplicate_ownership_first_wins() {
        let mut p = MappingProfile::new("dup");
        let shared = InputSource::axis("s", 0);
        p.axis_mappings.push(axis("x", vec![shared.clone()], vaxis(AxisSlot::X)));
        p.axis_mappings.push(axis(
            "y",
            vec![shared.clone(), InputSource::axis("s", 1)],
            vaxis(AxisSlot::Y),
        ));
        p.axis_mappings.push(axis("z", vec![shared], vaxis(AxisSlot::Z)));

        let report = sanitize(&mut p);
        assert_eq!(report.repaired, 1);
        assert_eq!(report.rejected, 1);
        assert_eq!(p.axis_mappings.len(), 2);
        assert_eq!(p.axis_mappings[1].inputs, vec![InputSource::axis("s", 1)]);
    }

    #[test]
    fn test_layers_checked_separately() {
        let mut p = MappingProfile::new("layers");
        let trigger = InputSource::button("s", 0);
        p.button_mappings.push(ButtonMapping::new(
            "fire",
            trigger.clone(),
            OutputTarget::VirtualButton { device: 1, index: 0 },
        ));

        let mut shift = ShiftLayer::new("shift", InputSource::button("s", 5));
        // Same physical input as the base mapping is fine inside a layer.
        shift.button_mappings.push(ButtonMapping::new(
            "alt-fire",
            trigger,
            OutputTarget::VirtualButton { device: 1, index: 10 },
        ));
        // The activator itself cannot be a layer input.
        shift.button_mappings.push(ButtonMapping::new(
            "self",
            InputSource::button("s", 5),
            OutputTarget::VirtualButton { device: 1, index: 11 },
        ));
        p.shift_layers.push(shift);
        p.shift_layers.push(ShiftLayer::new("bad", InputSource::axis("s", 0)));

        let report = sanitize(&mut p);
        assert_eq!(report.rejected, 2);
        assert_eq!(p.shift_layers.len(), 1);
        assert_eq!(p.shift_layers[0].button_mappings.len(), 1);
    }
}
