//! Store Module
//!
//! In-memory tables and the registry that owns them.
//!
//! ## Responsibilities
//! - Named string-to-string tables, created once and never dropped
//! - One exclusive lock per table, with a non-blocking attempt
//! - Undo log per table for transactional rollback
//! - Registry lock separate from every table lock
//!
//! ## Locking
//! ```text
//!   TableRegistry ── Mutex<HashMap<name, Arc<Table>>>     (create / find)
//!         │
//!         ▼
//!   Table ── Arc<Mutex<entries + undo log>>               (lock / try_lock)
//!         │
//!         ▼
//!   TableGuard                                            (set / get / commit / rollback)
//! ```

mod registry;
mod table;
mod undo;

pub use registry::TableRegistry;
pub use table::{Table, TableGuard};
pub use undo::UndoLog;
