//! Per-session mute registry with a persistence seam.
//!
//! Muting is a viewer-scoped relation: each session owns a set of display
//! names it refuses to hear from, and rooms consult the *recipient's* set
//! during fan-out. A mute never affects what other members receive.
//!
//! Every mutation rewrites the owner's full mute list through [`MuteStore`],
//! one name per line, last writer wins. Store failures are logged by the
//! caller and never surfaced to the muting session.

use std::{
    collections::BTreeSet,
    sync::{Mutex, PoisonError},
};

/// Names a session has chosen to suppress messages from.
///
/// Internally ordered so persisted snapshots are deterministic.
#[derive(Debug, Default)]
pub struct MuteRegistry {
    names: Mutex<BTreeSet<String>>,
}

impl MuteRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `name` to the mute set. Returns whether the set changed.
    pub fn mute(&self, name: &str) -> bool {
        self.lock().insert(name.to_string())
    }

    /// Removes `name` from the mute set. Returns whether the set changed.
    pub fn unmute(&self, name: &str) -> bool {
        self.lock().remove(name)
    }

    /// Whether this session has muted `name`.
    pub fn is_muted(&self, name: &str) -> bool {
        self.lock().contains(name)
    }

    /// Current mute set, in persisted (lexicographic) order.
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        // A poisoned lock only means another task panicked mid-update; the
        // set itself is always valid.
        self.names.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Errors from mute-list persistence.
#[derive(Debug, thiserror::Error)]
pub enum MuteStoreError {
    /// Underlying I/O failed.
    #[error("mute store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The owner has no usable storage key.
    #[error("unstorable mute list owner: {0:?}")]
    InvalidOwner(String),
}

/// Persistence hook for mute lists.
///
/// `names` is the owner's complete current set; implementations overwrite
/// any previous state for that owner wholesale.
pub trait MuteStore: Send + Sync {
    /// Persists the full mute list for `owner`.
    fn persist(&self, owner: &str, names: &[String]) -> Result<(), MuteStoreError>;
}

/// In-memory store, used by tests and as a no-setup default.
#[derive(Debug, Default)]
pub struct MemoryMuteStore {
    saved: Mutex<std::collections::HashMap<String, Vec<String>>>,
}

impl MemoryMuteStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The last list persisted for `owner`, if any.
    pub fn saved(&self, owner: &str) -> Option<Vec<String>> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(owner)
            .cloned()
    }
}

impl MuteStore for MemoryMuteStore {
    fn persist(&self, owner: &str, names: &[String]) -> Result<(), MuteStoreError> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(owner.to_string(), names.to_vec());
        Ok(())
    }
}
