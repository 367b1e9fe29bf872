//! Session Module
//!
//! The per-connection protocol state machine.
//!
//! ## States
//! ```text
//!   NOT_LOGGED_IN ──LOGIN──▶ AUTOCOMMIT ◀──COMMIT / rollback──┐
//!                                │                          │
//!                                └─────────BEGIN──────▶ TRANSACTION
//! ```
//!
//! ## Locking discipline (SET / GET)
//! - **Autocommit**: lock, operate, commit the undo log, unlock.
//! - **Transaction**: the first touch of a table uses `try_lock`; failure
//!   rolls back the whole transaction and reports `FailedTransaction`.
//!   Acquired locks are held until COMMIT or rollback.
//!
//! A session owns its stack, mode and held locks; nothing here is shared
//! with other connections except the registry and the tables themselves.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, TableKvError};
use crate::protocol::{ArithOp, Command, Message, MessageKind};
use crate::stack::OperandStack;
use crate::store::{TableGuard, TableRegistry};

/// Commit mode of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Each table access locks and commits on its own
    Autocommit,

    /// Table locks are held until COMMIT or rollback
    Transaction,
}

/// Protocol state for one client connection
pub struct Session {
    /// Shared table registry
    registry: Arc<TableRegistry>,

    /// Set by the LOGIN handshake
    username: Option<String>,

    mode: Mode,

    stack: OperandStack,

    /// Tables locked by the open transaction, by name
    locked: HashMap<String, TableGuard>,

    /// Set once BYE has been answered
    finished: bool,
}

impl Session {
    /// Create a fresh, not yet logged in session
    pub fn new(registry: Arc<TableRegistry>) -> Self {
        Self {
            registry,
            username: None,
            mode: Mode::Autocommit,
            stack: OperandStack::new(),
            locked: HashMap::new(),
            finished: false,
        }
    }

    /// Handle one decoded request and produce the reply
    ///
    /// Errors are returned rather than encoded; the caller decides between
    /// FAILED (recoverable) and ERROR + disconnect. A failed transaction has
    /// already been rolled back when this returns.
    pub fn handle(&mut self, message: Message) -> Result<Message> {
        if !self.is_logged_in() && message.kind() != MessageKind::Login {
            return Err(TableKvError::invalid("must log in first"));
        }

        let command = Command::try_from(message)?;
        tracing::trace!("Executing {:?}", command);

        let result = self.execute(command);

        if let Err(TableKvError::FailedTransaction(reason)) = &result {
            tracing::warn!(
                "Transaction of {} failed ({}), rolling back",
                self.username.as_deref().unwrap_or("?"),
                reason
            );
            self.rollback();
        }

        result
    }

    fn execute(&mut self, command: Command) -> Result<Message> {
        match command {
            Command::Login { username } => {
                if self.is_logged_in() {
                    return Err(TableKvError::invalid("already logged in"));
                }
                tracing::debug!("User {} logged in", username);
                self.username = Some(username);
            }
            Command::Create { table } => self.registry.create_table(&table)?,
            Command::Push { value } => self.stack.push(value),
            Command::Pop => {
                self.stack.pop()?;
            }
            Command::Top => return Ok(Message::data(self.stack.top()?)),
            Command::Set { table, key } => {
                self.with_table(&table, |guard, stack| {
                    let value = stack.pop()?;
                    guard.set(&key, value);
                    Ok(())
                })?;
            }
            Command::Get { table, key } => {
                self.with_table(&table, |guard, stack| {
                    let value = guard
                        .get(&key)
                        .ok_or_else(|| TableKvError::operation("key does not exist"))?;
                    stack.push(value);
                    Ok(())
                })?;
            }
            Command::Arith(op) => self.arith(op)?,
            Command::Begin => {
                if self.in_transaction() {
                    return Err(TableKvError::operation("transaction already in progress"));
                }
                self.locked.clear();
                self.mode = Mode::Transaction;
            }
            Command::Commit => {
                if !self.in_transaction() {
                    return Err(TableKvError::operation("no transaction has begun"));
                }
                self.commit();
            }
            Command::Bye => self.finished = true,
        }

        Ok(Message::ok())
    }

    /// Run `op` against a table under the current locking discipline
    fn with_table<T, F>(&mut self, name: &str, op: F) -> Result<T>
    where
        F: FnOnce(&mut TableGuard, &mut OperandStack) -> Result<T>,
    {
        let table = self
            .registry
            .find_table(name)
            .ok_or_else(|| TableKvError::operation("table does not exist"))?;

        match self.mode {
            Mode::Autocommit => {
                let mut guard = table.lock();
                let result = op(&mut guard, &mut self.stack);
                guard.commit_changes();
                result
            }
            Mode::Transaction => {
                let guard = match self.locked.entry(name.to_string()) {
                    Entry::Occupied(held) => held.into_mut(),
                    Entry::Vacant(slot) => {
                        let guard = table.try_lock().ok_or_else(|| {
                            TableKvError::FailedTransaction(format!(
                                "unable to lock table {}",
                                name
                            ))
                        })?;
                        slot.insert(guard)
                    }
                };
                op(guard, &mut self.stack)
            }
        }
    }

    /// Pop right then left, push `left op right`
    fn arith(&mut self, op: ArithOp) -> Result<()> {
        match self.stack.len() {
            0 => return Err(TableKvError::operation("stack is empty")),
            1 => return Err(TableKvError::operation("only one value on stack")),
            _ => {}
        }

        let right = self.stack.pop()?;
        let left = self.stack.pop()?;
        let result = op.apply(parse_operand(&left)?, parse_operand(&right)?)?;

        self.stack.push(result.to_string());
        Ok(())
    }

    fn commit(&mut self) {
        for (_, mut guard) in self.locked.drain() {
            guard.commit_changes();
        }
        self.mode = Mode::Autocommit;
    }

    /// Undo and release every table held by the open transaction
    fn rollback(&mut self) {
        for (name, mut guard) in self.locked.drain() {
            tracing::debug!("Rolling back table {}", name);
            guard.rollback_changes();
        }
        self.mode = Mode::Autocommit;
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn is_logged_in(&self) -> bool {
        self.username.is_some()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn in_transaction(&self) -> bool {
        self.mode == Mode::Transaction
    }

    /// Whether BYE has been handled
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn stack(&self) -> &OperandStack {
        &self.stack
    }

    /// Names of the tables held by the open transaction, sorted
    pub fn locked_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.locked.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.in_transaction() {
            tracing::debug!("Session ended inside a transaction, rolling back");
            self.rollback();
        }
    }
}

fn parse_operand(s: &str) -> Result<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TableKvError::operation(
            "operand is not a non-negative integer",
        ));
    }
    s.parse()
        .map_err(|_| TableKvError::operation("operand is too large"))
}
