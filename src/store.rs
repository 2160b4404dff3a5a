//! Shared, copy-on-write access to the active profile.
//!
//! The poll loop reads the profile every tick while editors (UI, auto-assign,
//! profile loads) mutate it occasionally. Readers take an [`Arc`] snapshot and
//! never block a writer for longer than a pointer swap; writers clone the
//! current profile, edit the clone and publish it under a new generation.

use std::sync::{Arc, PoisonError, RwLock};

use crate::binding::MappingProfile;

/// Which edit of which load a profile snapshot is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Version {
    /// Bumped by every [`SharedProfile::update`] and [`SharedProfile::replace`].
    pub generation: u64,
    /// Bumped by [`SharedProfile::replace`] only.
    pub loads: u64,
}

#[derive(Debug)]
struct Slot {
    profile: Arc<MappingProfile>,
    version: Version,
}

/// Cloneable handle to the active [`MappingProfile`].
#[derive(Debug, Clone)]
pub struct SharedProfile {
    inner: Arc<RwLock<Slot>>,
}

impl Default for SharedProfile {
    fn default() -> Self {
        Self::new(MappingProfile::default())
    }
}

impl SharedProfile {
    pub fn new(profile: MappingProfile) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Slot {
                profile: Arc::new(profile),
                version: Version::default(),
            })),
        }
    }

    /// Current profile. The snapshot stays valid after later edits.
    pub fn snapshot(&self) -> Arc<MappingProfile> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .profile
            .clone()
    }

    /// Current profile together with its version.
    pub fn versioned(&self) -> (Version, Arc<MappingProfile>) {
        let slot = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        (slot.version, slot.profile.clone())
    }

    pub fn version(&self) -> Version {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).version
    }

    /// Edit a private copy and publish it.
    ///
    /// The closure sees the profile as it was when the write lock was taken,
    /// so concurrent updates serialize instead of overwriting each other. The
    /// edit is published even if the closure changed nothing; use
    /// [`MappingProfile::modified_at`] to tell.
    pub fn update<R>(&self, edit: impl FnOnce(&mut MappingProfile) -> R) -> R {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut draft = MappingProfile::clone(&slot.profile);
        let out = edit(&mut draft);
        slot.profile = Arc::new(draft);
        slot.version.generation += 1;
        out
    }

    /// Swap in a different profile (profile load).
    pub fn replace(&self, profile: MappingProfile) {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        slot.profile = Arc::new(profile);
        slot.version.generation += 1;
        slot.version.loads += 1;
    }
}
