//! Table registry
//!
//! Owns every table by name. The registry has its own lock, independent of
//! the per-table locks, so creation and lookup never wait on table users.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, TableKvError};
use super::Table;

/// Name-indexed set of tables shared by all sessions
#[derive(Debug, Default)]
pub struct TableRegistry {
    tables: Mutex<HashMap<String, Arc<Table>>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table, failing if the name is taken
    pub fn create_table(&self, name: &str) -> Result<()> {
        let mut tables = self.tables.lock();
        if tables.contains_key(name) {
            return Err(TableKvError::operation("table already exists"));
        }

        tables.insert(name.to_string(), Arc::new(Table::new(name)));
        tracing::info!("Created table {:?}", name);
        Ok(())
    }

    /// Look up a table; the caller decides what absence means
    pub fn find_table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.lock().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tables.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.lock().is_empty()
    }

    /// Names of all tables, sorted
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.lock().keys().cloned().collect();
        names.sort();
        names
    }
}
