//! Error types for binding, curve editing, persistence and configuration.

use std::path::PathBuf;
use thiserror::Error;

use crate::binding::{InputSource, InputType, SlotKey};

/// Errors raised by the mapping engine.
///
/// Math on live samples never fails; these cover edits to the data model and
/// the persistence/config layers.
#[derive(Error, Debug)]
pub enum MapError {
    /// Deadzone values violate `min <= center_min <= 0 <= center_max <= max`.
    #[error("invalid deadzone: {0}")]
    InvalidDeadzone(String),

    /// A curve control point is outside `[0, 1]` or not strictly between its neighbours.
    #[error("invalid curve point ({x}, {y})")]
    InvalidCurvePoint { x: f32, y: f32 },

    /// The `(0,0)` and `(1,1)` endpoints cannot be moved or removed.
    #[error("curve endpoints are fixed")]
    EndpointLocked,

    /// Control point index does not exist.
    #[error("no control point at index {0}")]
    NoSuchPoint(usize),

    /// The input kind cannot feed this kind of mapping (e.g. a button into an axis).
    #[error("{input:?} input cannot feed a {slot:?} mapping")]
    InputKindMismatch { input: InputType, slot: SlotKey },

    /// The output target does not fit this kind of mapping (e.g. a POV on an axis mapping).
    #[error("output slot {0:?} does not fit this mapping kind")]
    OutputKindMismatch(SlotKey),

    /// A mapping needs at least one input.
    #[error("mapping has no inputs")]
    NoInputs,

    /// The same input is listed twice in one mapping.
    #[error("input {0:?} is listed twice")]
    DuplicateInput(InputSource),

    /// A layer's activator cannot also drive one of that layer's mappings.
    #[error("input is the activator of shift layer {0:?}")]
    ActivatorInput(String),

    /// No mapping occupies the requested output slot.
    #[error("no mapping for slot {0:?}")]
    UnknownMapping(SlotKey),

    /// Named shift layer does not exist.
    #[error("no shift layer named {0:?}")]
    UnknownLayer(String),

    /// Profile id not present in the store.
    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    /// Profile ids name files; separators and dot-names are refused.
    #[error("invalid profile id: {0:?}")]
    InvalidProfileId(String),

    /// Profile document is not an object / lacks the mapping arrays entirely.
    #[error("malformed profile document: {0}")]
    MalformedProfile(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl MapError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MapError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, MapError>;
