//! Operand Stack
//!
//! Per-connection LIFO of string values used to stage arguments for SET
//! and the arithmetic commands. Never shared between connections.

use crate::error::{Result, TableKvError};

/// LIFO buffer of values owned by one session
#[derive(Debug, Default, Clone)]
pub struct OperandStack {
    values: Vec<String>,
}

impl OperandStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: impl Into<String>) {
        self.values.push(value.into());
    }

    /// Peek at the top value without removing it
    pub fn top(&self) -> Result<&str> {
        self.values
            .last()
            .map(String::as_str)
            .ok_or_else(|| TableKvError::operation("stack is empty"))
    }

    /// Remove and return the top value
    pub fn pop(&mut self) -> Result<String> {
        self.values
            .pop()
            .ok_or_else(|| TableKvError::operation("stack is empty"))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values from bottom to top
    pub fn as_slice(&self) -> &[String] {
        &self.values
    }
}
