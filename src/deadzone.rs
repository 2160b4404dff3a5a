//! Four-point deadzone normalization.
//!
//! A [`Deadzone`] splits the signed axis range into two independently rescaled
//! halves:
//!
//! ```text
//!  -1 ── min ─────── center_min ── 0 ── center_max ─────── max ── 1
//!   └ -1 ┘└─ [-1, 0] ─┘└──────── 0 ────────┘└─ [0, 1] ─┘└ 1 ┘
//! ```
//!
//! Values beyond `min`/`max` saturate, values inside the centre band collapse
//! to `0`, and the remaining spans are stretched back to the full range.
//!
//! Normalization never fails: NaN is read as rest and out-of-range values clamp.

use serde::{Deserialize, Serialize};

use crate::error::{MapError, Result};

/// Spans shorter than this are treated as a step at the boundary.
const MIN_SPAN: f32 = 1e-6;

/// Deadzone settings for one axis.
///
/// Invariant: `-1 <= min <= center_min <= 0 <= center_max <= max <= 1`, and
/// `center_min == center_max == 0` whenever `center_enabled` is `false`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Deadzone {
    pub min: f32,
    pub center_min: f32,
    pub center_max: f32,
    pub max: f32,
    #[serde(default)]
    pub center_enabled: bool,
}

impl Default for Deadzone {
    fn default() -> Self {
        Self {
            min: -1.0,
            center_min: 0.0,
            center_max: 0.0,
            max: 1.0,
            center_enabled: false,
        }
    }
}

impl Deadzone {
    /// Build a deadzone, rejecting values that break the ordering invariant.
    ///
    /// When `center_enabled` is `false` the centre values must be `0`.
    pub fn new(
        min: f32,
        center_min: f32,
        center_max: f32,
        max: f32,
        center_enabled: bool,
    ) -> Result<Self> {
        let dz = Self {
            min,
            center_min,
            center_max,
            max,
            center_enabled,
        };
        dz.check()?;
        Ok(dz)
    }

    /// Outer deadzone only (no centre band).
    pub fn outer(min: f32, max: f32) -> Result<Self> {
        Self::new(min, 0.0, 0.0, max, false)
    }

    /// Symmetric centre band of half-width `radius` with full-range outer edges.
    pub fn centered(radius: f32) -> Result<Self> {
        Self::new(-1.0, -radius, radius, 1.0, true)
    }

    /// Validate the ordering invariant.
    pub fn check(&self) -> Result<()> {
        let vals = [self.min, self.center_min, self.center_max, self.max];
        if vals.iter().any(|v| !v.is_finite() || !(-1.0..=1.0).contains(v)) {
            return Err(MapError::InvalidDeadzone(format!(
                "values must lie in [-1, 1], got {vals:?}"
            )));
        }
        if !(self.min <= self.center_min
            && self.center_min <= 0.0
            && 0.0 <= self.center_max
            && self.center_max <= self.max)
        {
            return Err(MapError::InvalidDeadzone(format!(
                "expected min <= center_min <= 0 <= center_max <= max, got {vals:?}"
            )));
        }
        if !self.center_enabled && (self.center_min != 0.0 || self.center_max != 0.0) {
            return Err(MapError::InvalidDeadzone(
                "center values must be 0 when the center band is disabled".into(),
            ));
        }
        Ok(())
    }

    /// Clamp and reorder arbitrary values into a valid deadzone.
    ///
    /// Non-finite fields fall back to the default for that field.
    pub fn repaired(&self) -> Self {
        let fix = |v: f32, fallback: f32| if v.is_finite() { v.clamp(-1.0, 1.0) } else { fallback };

        let min = fix(self.min, -1.0).min(0.0);
        let max = fix(self.max, 1.0).max(0.0);
        let (center_min, center_max) = if self.center_enabled {
            (
                fix(self.center_min, 0.0).clamp(min, 0.0),
                fix(self.center_max, 0.0).clamp(0.0, max),
            )
        } else {
            (0.0, 0.0)
        };

        Self {
            min,
            center_min,
            center_max,
            max,
            center_enabled: self.center_enabled,
        }
    }

    /// Toggle the centre band. Disabling zeroes the centre values.
    pub fn with_center(mut self, enabled: bool) -> Self {
        self.center_enabled = enabled;
        if !enabled {
            self.center_min = 0.0;
            self.center_max = 0.0;
        }
        self
    }

    /// Map a raw signed value through the deadzone.
    ///
    /// Output is in `[-1, 1]` and non-decreasing in `v`.
    pub fn apply(&self, v: f32) -> f32 {
        let v = if v.is_nan() { 0.0 } else { v.clamp(-1.0, 1.0) };

        if v <= self.min {
            return -1.0;
        }
        if v >= self.max {
            return 1.0;
        }

        let (lo, hi) = if self.center_enabled {
            (self.center_min, self.center_max)
        } else {
            (0.0, 0.0)
        };

        if self.center_enabled && lo <= v && v <= hi {
            return 0.0;
        }

        let out = if v < lo {
            let span = lo - self.min;
            if span < MIN_SPAN {
                -1.0
            } else {
                (v - lo) / span
            }
        } else {
            let span = self.max - hi;
            if span < MIN_SPAN {
                1.0
            } else {
                (v - hi) / span
            }
        };

        out.clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweep() -> impl Iterator<Item = f32> {
        (-200..=200).map(|i| i as f32 / 200.0)
    }

    #[test]
    fn test_default_is_identity() {
        let dz = Deadzone::default();
        for v in sweep() {
            assert!((dz.apply(v) - v).abs() < 1e-6, "v={v}");
        }
    }

    #[test]
    fn test_boundaries() {
        let dz = Deadzone::new(-0.9, -0.1, 0.2, 0.8, true).unwrap();
        assert_eq!(dz.apply(-0.9), -1.0);
        assert_eq!(dz.apply(0.8), 1.0);
        assert_eq!(dz.apply(-1.0), -1.0);
        assert_eq!(dz.apply(1.0), 1.0);
        for v in [-0.1, -0.05, 0.0, 0.1, 0.2] {
            assert_eq!(dz.apply(v), 0.0, "v={v}");
        }
    }

    #[test]
    fn test_halves_rescale_independently() {
        let dz = Deadzone::new(-0.9, -0.1, 0.2, 0.8, true).unwrap();
        assert!((dz.apply(-0.5) - (-0.5)).abs() < 1e-6);
        assert!((dz.apply(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_monotonic() {
        let zones = [
            Deadzone::default(),
            Deadzone::new(-0.9, -0.1, 0.2, 0.8, true).unwrap(),
            Deadzone::outer(-0.5, 0.95).unwrap(),
            Deadzone::centered(0.3).unwrap(),
            Deadzone::new(-0.4, -0.4, 0.0, 1.0, true).unwrap(),
        ];
        for dz in zones {
            let mut prev = f32::NEG_INFINITY;
            for v in sweep() {
                let out = dz.apply(v);
                assert!(out >= prev, "{dz:?} not monotonic at {v}");
                assert!((-1.0..=1.0).contains(&out));
                prev = out;
            }
        }
    }

    #[test]
    fn test_degenerate_span_is_step() {
        // center_min == min: nothing between them to rescale
        let dz = Deadzone::new(-0.4, -0.4, 0.0, 1.0, true).unwrap();
        assert_eq!(dz.apply(-0.41), -1.0);
        assert_eq!(dz.apply(-0.39), 0.0);
        let dz = Deadzone::new(-1.0, 0.0, 0.5, 0.5, true).unwrap();
        assert_eq!(dz.apply(0.5), 1.0);
        assert_eq!(dz.apply(0.49), 0.0);
    }

    #[test]
    fn test_nan_and_out_of_range() {
        let dz = Deadzone::centered(0.1).unwrap();
        assert_eq!(dz.apply(f32::NAN), 0.0);
        assert_eq!(dz.apply(7.0), 1.0);
        assert_eq!(dz.apply(f32::NEG_INFINITY), -1.0);
    }

    #[test]
    fn test_new_rejects_bad_order() {
        assert!(Deadzone::new(-0.5, 0.1, 0.2, 1.0, true).is_err());
        assert!(Deadzone::new(-1.0, 0.0, 0.3, 0.2, true).is_err());
        assert!(Deadzone::new(-1.0, -0.1, 0.1, 1.0, false).is_err());
        assert!(Deadzone::new(-1.5, 0.0, 0.0, 1.0, false).is_err());
    }

    #[test]
    fn test_repaired_is_valid() {
        let broken = Deadzone {
            min: 0.3,
            center_min: 0.5,
            center_max: -0.2,
            max: 4.0,
            center_enabled: true,
        };
        let fixed = broken.repaired();
        fixed.check().unwrap();
        assert_eq!(fixed.min, 0.0);
        assert_eq!(fixed.max, 1.0);

        let nan = Deadzone {
            min: f32::NAN,
            center_min: 0.0,
            center_max: 0.0,
            max: f32::INFINITY,
            center_enabled: false,
        };
        assert_eq!(nan.repaired(), Deadzone::default());
    }

    #[test]
    fn test_with_center_disable_zeroes_band() {
        let dz = Deadzone::centered(0.2).unwrap().with_center(false);
        dz.check().unwrap();
        assert_eq!(dz.center_min, 0.0);
        assert_eq!(dz.center_max, 0.0);
    }
}
