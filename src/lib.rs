//! stickmap: HOTAS/joystick input mapping engine.
//!
//! Routes physical axes, buttons and hats onto virtual joystick slots and
//! keystrokes, reshaping the signal on the way:
//!
//! - [`deadzone`], [`curve`], [`transform`]: the per-axis pipeline;
//! - [`button_mode`]: normal / toggle / pulse / hold-to-activate;
//! - [`binding`]: the profile data model, [`conflict`] keeps input ownership
//!   unique, [`auto_assign`] builds 1:1 mappings by control type;
//! - [`detector`]: async "press the control to bind" capture;
//! - [`engine`]: per-tick evaluation and the fixed-rate poll loop;
//! - [`persist`], [`validate`], [`config`]: profiles on disk and engine settings.
//!
//! Devices plug in through [`device::Device`]; outputs through the traits in
//! [`backends`].

pub mod auto_assign;
pub mod backends;
pub mod binding;
pub mod button_mode;
pub mod config;
pub mod conflict;
pub mod curve;
pub mod deadzone;
pub mod detector;
pub mod device;
pub mod engine;
pub mod error;
pub mod event;
pub mod eventbus;
pub mod logger;
pub mod manager;
pub mod persist;
pub mod snapshot;
pub mod store;
pub mod transform;
pub mod validate;

pub use binding::*;
pub use device::*;
pub use event::*;
pub use eventbus::*;
pub use manager::*;

pub use auto_assign::{auto_assign, AutoAssignReport, VirtualCapacity};
pub use backends::{KeyboardInjector, PovValue, VirtualDeviceWriter};
pub use button_mode::{ButtonMode, ButtonState};
pub use config::{DetectorConfig, EngineConfig};
pub use conflict::{bind_input, find_owner, remove_input, BindOutcome, BindTarget, MappingDraft};
pub use curve::{AxisCurve, CurvePoint, CurveType};
pub use deadzone::Deadzone;
pub use detector::{DetectFilter, DetectOutcome, DetectState, InputWaitDetector};
pub use engine::{MappingEngine, PollLoop};
pub use error::{MapError, Result};
pub use logger::Logger;
pub use persist::{JsonDirStore, ProfileStore};
pub use snapshot::{DeviceSample, DeviceSnapshot, Snapshot};
pub use store::SharedProfile;
pub use transform::AxisRange;
pub use validate::RepairReport;
