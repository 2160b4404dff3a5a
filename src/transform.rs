//! Per-axis signal pipeline.
//!
//! raw inputs → combine → [`Deadzone`](crate::deadzone::Deadzone) →
//! [`AxisCurve`] on `|v|` → restore sign → native integer range.

use serde::{Deserialize, Serialize};

use crate::curve::AxisCurve;

/// Combine several raw readings feeding one axis.
///
/// The reading furthest from rest wins; on a tie the earliest one is kept.
/// An empty input reads as rest.
pub fn combine_axes<I: IntoIterator<Item = f32>>(values: I) -> f32 {
    let mut best = 0.0f32;
    for v in values {
        let v = if v.is_nan() { 0.0 } else { v.clamp(-1.0, 1.0) };
        if v.abs() > best.abs() {
            best = v;
        }
    }
    best
}

/// Shape one raw value into a signed output in `[-1, 1]`.
pub fn transform(raw: f32, curve: &AxisCurve) -> f32 {
    let dz = curve.deadzone.apply(raw);
    let sign = if dz < 0.0 { -1.0 } else { 1.0 };
    let mag = curve.evaluate(dz.abs());
    (sign * mag).clamp(-1.0, 1.0)
}

/// Native integer range of a virtual-device axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
}

impl Default for AxisRange {
    /// vJoy's axis range.
    fn default() -> Self {
        Self { min: 0, max: 32767 }
    }
}

impl AxisRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Map `[-1, 1]` linearly onto `[min, max]`, rounding to nearest.
    pub fn scale(&self, v: f32) -> i32 {
        let v = if v.is_nan() { 0.0 } else { f64::from(v.clamp(-1.0, 1.0)) };
        let span = self.max as f64 - self.min as f64;
        let out = self.min as f64 + (v + 1.0) * 0.5 * span;
        out.round() as i32
    }

    /// Midpoint (rest) value.
    pub fn center(&self) -> i32 {
        self.scale(0.0)
    }
}
