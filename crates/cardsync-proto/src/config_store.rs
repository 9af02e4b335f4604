//! Typed key/value store replicated between server and clients.

use parking_lot::Mutex;

use crate::message::config_sync::{ConfigEntry, ConfigValueKind};

/// Holds the current snapshot, sorted by `category.name`. Loop-suppression
/// for `apply_update` is a single flag: while an incoming update is being
/// applied, outbound echo is disabled so reacting to our own write doesn't
/// re-broadcast it.
pub struct ConfigStore {
    entries: Mutex<Vec<ConfigEntry>>,
    applying_incoming: Mutex<bool>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self { entries: Mutex::new(Vec::new()), applying_incoming: Mutex::new(false) }
    }

    pub fn snapshot(&self) -> Vec<ConfigEntry> {
        self.entries.lock().clone()
    }

    pub fn get(&self, full_name: &str) -> Option<ConfigEntry> {
        self.entries.lock().iter().find(|e| e.full_name() == full_name).cloned()
    }

    /// Apply a full snapshot: update entries in place (preserving identity
    /// for anything watching a full_name), drop anything absent from the
    /// snapshot, then sort by `category.name`.
    pub fn apply_snapshot(&self, incoming: Vec<ConfigEntry>) {
        let mut entries = self.entries.lock();
        let mut next = Vec::with_capacity(incoming.len());
        for new_entry in incoming {
            if let Some(existing) = entries.iter().find(|e| e.full_name() == new_entry.full_name())
            {
                let mut merged = existing.clone();
                merged.value = new_entry.value;
                merged.description = new_entry.description;
                next.push(merged);
            } else {
                next.push(new_entry);
            }
        }
        next.sort_by(|a, b| a.full_name().cmp(&b.full_name()));
        *entries = next;
    }

    /// Apply a single incoming update. Returns `true` if the value actually
    /// changed (callers use this to decide whether to re-broadcast anything
    /// downstream — the update itself is never re-broadcast here, per the
    /// loop-suppression rule: receivers disable send while applying).
    pub fn apply_update(&self, entry: ConfigEntry) -> bool {
        *self.applying_incoming.lock() = true;
        let changed = {
            let mut entries = self.entries.lock();
            match entries.iter_mut().find(|e| e.full_name() == entry.full_name()) {
                Some(existing) => {
                    let changed = existing.value != entry.value;
                    existing.value = entry.value;
                    existing.description = entry.description;
                    changed
                }
                None => {
                    entries.push(entry);
                    entries.sort_by(|a, b| a.full_name().cmp(&b.full_name()));
                    true
                }
            }
        };
        *self.applying_incoming.lock() = false;
        changed
    }

    /// Mutate a value locally (not from the wire). Returns the updated entry
    /// if the value actually changed, so the caller can decide to broadcast
    /// a `ConfigValue` update — unless an incoming update is currently being
    /// applied, in which case outbound echo is suppressed.
    pub fn set_local(&self, full_name: &str, value: ConfigValueKind) -> Option<ConfigEntry> {
        if *self.applying_incoming.lock() {
            return None;
        }
        let mut entries = self.entries.lock();
        let existing = entries.iter_mut().find(|e| e.full_name() == full_name)?;
        if existing.value == value {
            return None;
        }
        existing.value = value;
        Some(existing.clone())
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}
