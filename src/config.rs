//! Engine configuration.
//!
//! Stored as TOML. Every field has a default, so a partial file (or none at
//! all) yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auto_assign::VirtualCapacity;
use crate::error::{MapError, Result};
use crate::transform::AxisRange;

/// Input-wait detector tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Samples in this window after the session starts are ignored.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Minimum axis deviation from rest that counts as a move.
    #[serde(default = "default_axis_threshold")]
    pub axis_threshold: f32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_settle_ms() -> u64 {
    200
}

fn default_axis_threshold() -> f32 {
    0.5
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            axis_threshold: default_axis_threshold(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl DetectorConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Poll loop rate.
    #[serde(default = "default_poll_hz")]
    pub poll_hz: u32,
    /// Native value range of the virtual-device writer.
    #[serde(default)]
    pub axis_range: AxisRange,
    #[serde(default)]
    pub detector: DetectorConfig,
    /// Virtual devices available for auto-assignment.
    #[serde(default = "default_virtual_devices")]
    pub virtual_devices: Vec<VirtualCapacity>,
}

fn default_poll_hz() -> u32 {
    100
}

fn default_virtual_devices() -> Vec<VirtualCapacity> {
    vec![VirtualCapacity::full(1, 32, 1, 0)]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_hz: default_poll_hz(),
            axis_range: AxisRange::default(),
            detector: DetectorConfig::default(),
            virtual_devices: default_virtual_devices(),
        }
    }
}

impl EngineConfig {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stickmap")
            .join("engine.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| MapError::io(path, e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MapError::io(parent, e))?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| MapError::io(path, e))
    }

    /// Tick period for the poll loop. A zero rate falls back to the default.
    pub fn poll_period(&self) -> Duration {
        let hz = if self.poll_hz == 0 { default_poll_hz() } else { self.poll_hz };
        Duration::from_secs_f64(1.0 / f64::from(hz))
    }
}
