//! Command definitions
//!
//! Typed view of a request message.

use crate::error::{Result, TableKvError};
use super::{Message, MessageKind};

/// Arithmetic operators over the operand stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    /// Apply `left op right` with unsigned checked arithmetic
    pub fn apply(&self, left: u64, right: u64) -> Result<u64> {
        match self {
            ArithOp::Add => left
                .checked_add(right)
                .ok_or_else(|| TableKvError::operation("arithmetic overflow")),
            ArithOp::Sub => left
                .checked_sub(right)
                .ok_or_else(|| TableKvError::operation("arithmetic underflow")),
            ArithOp::Mul => left
                .checked_mul(right)
                .ok_or_else(|| TableKvError::operation("arithmetic overflow")),
            ArithOp::Div => left
                .checked_div(right)
                .ok_or_else(|| TableKvError::operation("divide by zero")),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            ArithOp::Add => MessageKind::Add,
            ArithOp::Sub => MessageKind::Sub,
            ArithOp::Mul => MessageKind::Mul,
            ArithOp::Div => MessageKind::Div,
        }
    }
}

/// A parsed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// One-time handshake naming the user
    Login { username: String },

    /// Create an empty table
    Create { table: String },

    /// Push a value onto the operand stack
    Push { value: String },

    /// Discard the top of the operand stack
    Pop,

    /// Reply with the top of the operand stack
    Top,

    /// Pop the stack top into `table[key]`
    Set { table: String, key: String },

    /// Push `table[key]` onto the stack
    Get { table: String, key: String },

    /// Pop two operands, push the result
    Arith(ArithOp),

    /// Enter transaction mode
    Begin,

    /// Commit and leave transaction mode
    Commit,

    /// End the session
    Bye,
}

impl Command {
    /// Get the message kind of this command
    pub fn kind(&self) -> MessageKind {
        match self {
            Command::Login { .. } => MessageKind::Login,
            Command::Create { .. } => MessageKind::Create,
            Command::Push { .. } => MessageKind::Push,
            Command::Pop => MessageKind::Pop,
            Command::Top => MessageKind::Top,
            Command::Set { .. } => MessageKind::Set,
            Command::Get { .. } => MessageKind::Get,
            Command::Arith(op) => op.kind(),
            Command::Begin => MessageKind::Begin,
            Command::Commit => MessageKind::Commit,
            Command::Bye => MessageKind::Bye,
        }
    }
}

impl TryFrom<Message> for Command {
    type Error = TableKvError;

    fn try_from(message: Message) -> Result<Self> {
        message.validate()?;

        let kind = message.kind();
        let mut args = message.into_args().into_iter();
        let mut next = || args.next().unwrap_or_default();

        let command = match kind {
            MessageKind::Login => Command::Login { username: next() },
            MessageKind::Create => Command::Create { table: next() },
            MessageKind::Push => Command::Push { value: next() },
            MessageKind::Pop => Command::Pop,
            MessageKind::Top => Command::Top,
            MessageKind::Set => {
                let table = next();
                Command::Set { table, key: next() }
            }
            MessageKind::Get => {
                let table = next();
                Command::Get { table, key: next() }
            }
            MessageKind::Add => Command::Arith(ArithOp::Add),
            MessageKind::Sub => Command::Arith(ArithOp::Sub),
            MessageKind::Mul => Command::Arith(ArithOp::Mul),
            MessageKind::Div => Command::Arith(ArithOp::Div),
            MessageKind::Begin => Command::Begin,
            MessageKind::Commit => Command::Commit,
            MessageKind::Bye => Command::Bye,
            MessageKind::Ok | MessageKind::Failed | MessageKind::Error | MessageKind::Data => {
                return Err(TableKvError::invalid(format!(
                    "{} is not a request",
                    kind
                )))
            }
        };

        Ok(command)
    }
}

impl From<Command> for Message {
    fn from(command: Command) -> Self {
        let kind = command.kind();
        match command {
            Command::Login { username } => Message::new(kind, [username]),
            Command::Create { table } => Message::new(kind, [table]),
            Command::Push { value } => Message::new(kind, [value]),
            Command::Set { table, key } | Command::Get { table, key } => {
                Message::new(kind, [table, key])
            }
            _ => Message::bare(kind),
        }
    }
}
