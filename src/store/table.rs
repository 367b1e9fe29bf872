//! Table implementation
//!
//! HashMap-based table behind an exclusive parking_lot mutex. Guards are
//! owned (`Arc`-backed) so a transaction can hold a table across requests.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};

use super::UndoLog;

/// Data protected by a table's lock
#[derive(Debug, Default)]
struct TableState {
    entries: HashMap<String, String>,
    undo: UndoLog,
}

/// A named string-to-string map with an exclusive lock
#[derive(Debug)]
pub struct Table {
    name: Arc<str>,
    state: Arc<Mutex<TableState>>,
}

impl Table {
    /// Create a new empty table
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            state: Arc::new(Mutex::new(TableState::default())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block until the lock is acquired
    pub fn lock(&self) -> TableGuard {
        TableGuard {
            name: Arc::clone(&self.name),
            state: self.state.lock_arc(),
        }
    }

    /// Acquire the lock only if it is free right now
    pub fn try_lock(&self) -> Option<TableGuard> {
        self.state.try_lock_arc().map(|state| TableGuard {
            name: Arc::clone(&self.name),
            state,
        })
    }

    /// Whether some session currently holds the lock
    pub fn is_locked(&self) -> bool {
        self.state.is_locked()
    }
}

/// Exclusive access to a table's data
///
/// Every data operation goes through a guard, so the lock is always held
/// by the caller. Dropping the guard releases the lock.
pub struct TableGuard {
    name: Arc<str>,
    state: ArcMutexGuard<RawMutex, TableState>,
}

impl TableGuard {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store `value` under `key`, recording what it replaces in the undo log
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let TableState { entries, undo } = &mut *self.state;

        match entries.get_mut(key) {
            Some(current) => {
                undo.record_overwrite(key, current);
                *current = value.into();
            }
            None => {
                undo.record_insert(key);
                entries.insert(key.to_string(), value.into());
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.state.entries.get(key).map(String::as_str)
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.state.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.entries.is_empty()
    }

    /// Whether there are mutations since the last commit/rollback
    pub fn has_pending_changes(&self) -> bool {
        !self.state.undo.is_empty()
    }

    /// Make pending changes permanent
    pub fn commit_changes(&mut self) {
        self.state.undo.clear();
    }

    /// Restore the table to its state at the last commit/rollback
    pub fn rollback_changes(&mut self) {
        let TableState { entries, undo } = &mut *self.state;
        undo.undo(entries);
    }

    /// Release the lock
    pub fn unlock(self) {
        drop(self);
    }
}

impl fmt::Debug for TableGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableGuard")
            .field("name", &self.name)
            .field("entries", &self.state.entries.len())
            .field("pending", &!self.state.undo.is_empty())
            .finish()
    }
}
