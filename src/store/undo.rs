//! Undo log
//!
//! Records what a table looked like before the mutations of the current
//! transaction so they can be reversed.

use std::collections::{HashMap, HashSet};

/// Pending-change record for one table
///
/// Invariant: describes exactly the mutations applied since the last
/// commit or rollback, and is empty right after either.
#[derive(Debug, Default)]
pub struct UndoLog {
    /// Original values of keys overwritten since the last commit/rollback
    overwritten: HashMap<String, String>,

    /// Keys that did not exist at the last commit/rollback
    added: HashSet<String>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` was already mutated since the last commit/rollback
    pub fn touches(&self, key: &str) -> bool {
        self.overwritten.contains_key(key) || self.added.contains(key)
    }

    /// Remember the value a key held before its first overwrite
    pub fn record_overwrite(&mut self, key: &str, original: &str) {
        if !self.touches(key) {
            self.overwritten.insert(key.to_string(), original.to_string());
        }
    }

    /// Remember that a key did not exist before
    pub fn record_insert(&mut self, key: &str) {
        self.added.insert(key.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.overwritten.is_empty() && self.added.is_empty()
    }

    pub fn clear(&mut self) {
        self.overwritten.clear();
        self.added.clear();
    }

    /// Reverse every recorded mutation on `entries` and empty the log
    pub fn undo(&mut self, entries: &mut HashMap<String, String>) {
        for (key, original) in self.overwritten.drain() {
            entries.insert(key, original);
        }
        for key in self.added.drain() {
            entries.remove(&key);
        }
    }
}
