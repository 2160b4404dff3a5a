//! Response curves.
//!
//! An [`AxisCurve`] reshapes a normalized magnitude `x ∈ [0, 1]` into an output
//! magnitude `y ∈ [0, 1]`. The sign of the axis is handled by the caller
//! (see [`crate::transform`]).
//!
//! Preset shapes are closed-form. `Custom` curves interpolate user control
//! points with a Catmull-Rom spline; the neighbours of the first and last
//! segment are synthesized by linear extrapolation so the spline passes through
//! every control point including the fixed `(0,0)` / `(1,1)` endpoints.

use serde::{Deserialize, Serialize};

use crate::deadzone::Deadzone;
use crate::error::{MapError, Result};

/// Shape of a response curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CurveType {
    #[default]
    Linear,
    /// Smoothstep: `x²(3 − 2x)`.
    SCurve,
    /// `x²`
    Exponential,
    /// Catmull-Rom through `control_points`.
    Custom,
}

/// A control point in the unit square.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub x: f32,
    pub y: f32,
}

impl CurvePoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<(f32, f32)> for CurvePoint {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

pub const CURVE_START: CurvePoint = CurvePoint::new(0.0, 0.0);
pub const CURVE_END: CurvePoint = CurvePoint::new(1.0, 1.0);

fn default_points() -> Vec<CurvePoint> {
    vec![CURVE_START, CURVE_END]
}

/// Per-axis shaping: deadzone, curve shape, control points and inversion.
///
/// Invariant: `control_points` starts with `(0,0)`, ends with `(1,1)` and is
/// strictly increasing in `x`. The editing methods below keep it that way;
/// deserialized curves are checked by [`crate::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisCurve {
    #[serde(default)]
    pub curve_type: CurveType,
    #[serde(default = "default_points")]
    pub control_points: Vec<CurvePoint>,
    #[serde(default)]
    pub inverted: bool,
    #[serde(default)]
    pub deadzone: Deadzone,
}

impl Default for AxisCurve {
    fn default() -> Self {
        Self {
            curve_type: CurveType::Linear,
            control_points: default_points(),
            inverted: false,
            deadzone: Deadzone::default(),
        }
    }
}

impl AxisCurve {
    /// Preset curve with only the endpoints.
    pub fn preset(curve_type: CurveType) -> Self {
        Self {
            curve_type,
            ..Self::default()
        }
    }

    /// Custom curve through the given interior points.
    ///
    /// Points must be inside the open unit interval on `x` and are inserted one
    /// by one, so unsorted input is fine but duplicates on `x` are rejected.
    pub fn custom<I, P>(interior: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<CurvePoint>,
    {
        let mut curve = Self::preset(CurveType::Custom);
        for p in interior {
            let p = p.into();
            curve.add_point(p.x, p.y)?;
        }
        Ok(curve)
    }

    pub fn with_deadzone(mut self, deadzone: Deadzone) -> Self {
        self.deadzone = deadzone;
        self
    }

    pub fn inverted(mut self, inverted: bool) -> Self {
        self.inverted = inverted;
        self
    }

    /// Evaluate the curve at `x`, including inversion. Result is clamped to `[0, 1]`.
    pub fn evaluate(&self, x: f32) -> f32 {
        let x = if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) };

        let y = match self.curve_type {
            CurveType::Linear => x,
            CurveType::SCurve => x * x * (3.0 - 2.0 * x),
            CurveType::Exponential => x * x,
            CurveType::Custom => catmull_rom(&self.control_points, x),
        };

        let y = if self.inverted { 1.0 - y } else { y };
        if y.is_nan() {
            0.0
        } else {
            y.clamp(0.0, 1.0)
        }
    }

    /// Insert an interior control point, keeping points sorted by `x`.
    ///
    /// Returns the index of the new point.
    pub fn add_point(&mut self, x: f32, y: f32) -> Result<usize> {
        if !interior_coord(x) || !unit_coord(y) {
            return Err(MapError::InvalidCurvePoint { x, y });
        }
        let idx = self.control_points.partition_point(|p| p.x < x);
        if self
            .control_points
            .get(idx)
            .is_some_and(|p| p.x == x)
        {
            return Err(MapError::InvalidCurvePoint { x, y });
        }
        self.control_points.insert(idx, CurvePoint::new(x, y));
        Ok(idx)
    }

    /// Remove an interior control point.
    pub fn remove_point(&mut self, idx: usize) -> Result<CurvePoint> {
        let last = self.control_points.len().saturating_sub(1);
        if idx >= self.control_points.len() {
            return Err(MapError::NoSuchPoint(idx));
        }
        if idx == 0 || idx == last {
            return Err(MapError::EndpointLocked);
        }
        Ok(self.control_points.remove(idx))
    }

    /// Move an interior control point. `x` must stay strictly between the
    /// neighbouring points.
    pub fn move_point(&mut self, idx: usize, x: f32, y: f32) -> Result<()> {
        let last = self.control_points.len().saturating_sub(1);
        if idx >= self.control_points.len() {
            return Err(MapError::NoSuchPoint(idx));
        }
        if idx == 0 || idx == last {
            return Err(MapError::EndpointLocked);
        }
        let lo = self.control_points[idx - 1].x;
        let hi = self.control_points[idx + 1].x;
        if !(x > lo && x < hi) || !unit_coord(y) {
            return Err(MapError::InvalidCurvePoint { x, y });
        }
        self.control_points[idx] = CurvePoint::new(x, y);
        Ok(())
    }

    /// Drop all interior points.
    pub fn reset_points(&mut self) {
        self.control_points = default_points();
    }

    /// Whether `control_points` satisfies the endpoint/ordering invariant.
    pub fn points_valid(&self) -> bool {
        let pts = &self.control_points;
        pts.len() >= 2
            && pts.first() == Some(&CURVE_START)
            && pts.last() == Some(&CURVE_END)
            && pts.iter().all(|p| unit_coord(p.x) && unit_coord(p.y))
            && pts.windows(2).all(|w| w[0].x < w[1].x)
    }

    /// Rebuild `control_points` so [`points_valid`](Self::points_valid) holds.
    ///
    /// Non-finite points are dropped, coordinates clamped, interior duplicates
    /// on `x` collapsed (first wins) and the endpoints restored.
    pub fn repair_points(&mut self) {
        let mut interior: Vec<CurvePoint> = self
            .control_points
            .iter()
            .filter(|p| p.x.is_finite() && p.y.is_finite())
            .map(|p| CurvePoint::new(p.x.clamp(0.0, 1.0), p.y.clamp(0.0, 1.0)))
            .filter(|p| interior_coord(p.x))
            .collect();
        interior.sort_by(|a, b| a.x.total_cmp(&b.x));
        interior.dedup_by(|b, a| a.x == b.x);

        let mut pts = Vec::with_capacity(interior.len() + 2);
        pts.push(CURVE_START);
        pts.extend(interior);
        pts.push(CURVE_END);
        self.control_points = pts;
    }
}

fn unit_coord(v: f32) -> bool {
    v.is_finite() && (0.0..=1.0).contains(&v)
}

fn interior_coord(v: f32) -> bool {
    v.is_finite() && v > 0.0 && v < 1.0
}

/// Catmull-Rom interpolation of `y` over sorted points.
///
/// Outside `[first.x, last.x]` the nearest endpoint's `y` is returned.
fn catmull_rom(points: &[CurvePoint], x: f32) -> f32 {
    let (first, last) = match (points.first(), points.last()) {
        (Some(f), Some(l)) => (*f, *l),
        _ => return x,
    };
    if points.len() < 2 || x <= first.x {
        return first.y;
    }
    if x >= last.x {
        return last.y;
    }

    // Last segment whose start is <= x.
    let i = points
        .partition_point(|p| p.x <= x)
        .saturating_sub(1)
        .min(points.len() - 2);

    let p1 = points[i];
    let p2 = points[i + 1];
    let p0 = if i > 0 {
        points[i - 1].y
    } else {
        2.0 * p1.y - p2.y
    };
    let p3 = if i + 2 < points.len() {
        points[i + 2].y
    } else {
        2.0 * p2.y - p1.y
    };

    let span = p2.x - p1.x;
    if span <= 0.0 {
        return p2.y;
    }
    let t = (x - p1.x) / span;
    let t2 = t * t;
    let t3 = t2 * t;
    let (p1, p2) = (p1.y, p2.y);

    0.5 * (2.0 * p1
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)
}
