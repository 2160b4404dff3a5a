//! Profile persistence.
//!
//! Profiles are JSON documents. Loading is tolerant: the document is decoded
//! one mapping at a time, so an entry that no longer parses is dropped and
//! counted instead of failing the whole profile, and the result then goes
//! through [`validate::sanitize`](crate::validate::sanitize).

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::binding::MappingProfile;
use crate::error::{MapError, Result};
use crate::validate::{sanitize, RepairReport};

/// Storage for named profiles.
pub trait ProfileStore {
    /// Load and sanitize a profile.
    fn load(&self, id: &str) -> Result<(MappingProfile, RepairReport)>;

    fn save(&self, id: &str, profile: &MappingProfile) -> Result<()>;

    /// Stored profile ids, sorted.
    fn list(&self) -> Result<Vec<String>>;

    fn delete(&self, id: &str) -> Result<()>;
}

/// Decode a profile document, repairing or dropping bad mappings.
///
/// Only a document that is not a JSON object, or whose mapping collections
/// are not arrays, is an error.
pub fn decode_profile(json: &str) -> Result<(MappingProfile, RepairReport)> {
    let value: Value = serde_json::from_str(json)?;
    let Value::Object(doc) = value else {
        return Err(MapError::MalformedProfile("expected a JSON object".into()));
    };

    let mut report = RepairReport::default();
    let now = Utc::now();
    let name = doc.get("name").and_then(Value::as_str).unwrap_or_default();
    let mut profile = MappingProfile::new(name);
    profile.created_at = timestamp(&doc, "created_at").unwrap_or(now);
    profile.modified_at = timestamp(&doc, "modified_at").unwrap_or(profile.created_at);

    profile.axis_mappings = entries(&doc, "axis_mappings", &mut report)?;
    profile.button_mappings = entries(&doc, "button_mappings", &mut report)?;
    profile.hat_mappings = entries(&doc, "hat_mappings", &mut report)?;
    profile.shift_layers = entries(&doc, "shift_layers", &mut report)?;

    report.merge(sanitize(&mut profile));
    Ok((profile, report))
}

fn timestamp(doc: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    doc.get(key)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

fn entries<T: DeserializeOwned>(
    doc: &Map<String, Value>,
    key: &str,
    report: &mut RepairReport,
) -> Result<Vec<T>> {
    let items = match doc.get(key) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(MapError::MalformedProfile(format!("{key} is not an array"))),
    };

    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match T::deserialize(item) {
            Ok(entry) => out.push(entry),
            Err(e) => report.reject(format!("{key}[{i}]: {e}")),
        }
    }
    Ok(out)
}

/// Encode a profile as pretty-printed JSON.
pub fn encode_profile(profile: &MappingProfile) -> Result<String> {
    Ok(serde_json::to_string_pretty(profile)?)
}

/// One `<id>.json` file per profile in a directory.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Per-user profile directory.
    pub fn default_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stickmap")
            .join("profiles")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, id: &str) -> Result<PathBuf> {
        let bad = id.is_empty()
            || id.starts_with('.')
            || id.contains(|c: char| c == '/' || c == '\\' || c == ':' || c.is_control());
        if bad {
            return Err(MapError::InvalidProfileId(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }
}

impl ProfileStore for JsonDirStore {
    fn load(&self, id: &str) -> Result<(MappingProfile, RepairReport)> {
        let path = self.path(id)?;
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MapError::ProfileNotFound(id.to_string()));
            }
            Err(e) => return Err(MapError::io(path, e)),
        };
        let (profile, report) = decode_profile(&content)?;
        info!(
            profile = id,
            mappings = profile.mapping_count(),
            repaired = report.repaired,
            rejected = report.rejected,
            "profile loaded"
        );
        Ok((profile, report))
    }

    fn save(&self, id: &str, profile: &MappingProfile) -> Result<()> {
        let path = self.path(id)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| MapError::io(&self.dir, e))?;
        let content = encode_profile(profile)?;

        // Write-then-rename so a crash never leaves a truncated profile.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(|e| MapError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| MapError::io(&path, e))?;
        debug!(profile = id, path = %path.display(), "profile saved");
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MapError::io(&self.dir, e)),
        };

        let mut ids: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn delete(&self, id: &str) -> Result<()> {
        let path = self.path(id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(MapError::ProfileNotFound(id.to_string()))
            }
            Err(e) => Err(MapError::io(path, e)),
        }
    }
}
