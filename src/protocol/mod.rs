//! Protocol Module
//!
//! Defines the line-oriented wire protocol for client-server communication.
//!
//! ## Protocol Format
//!
//! One message per line, fields separated by single spaces, `\n` terminated,
//! at most [`MAX_ENCODED_LEN`] bytes including the terminator.
//!
//! ### Requests
//! - `LOGIN <user>`, `CREATE <table>`
//! - `PUSH <value>`, `POP`, `TOP`
//! - `SET <table> <key>`, `GET <table> <key>`
//! - `ADD`, `SUB`, `MUL`, `DIV`
//! - `BEGIN`, `COMMIT`, `BYE`
//!
//! ### Responses
//! - `OK`
//! - `DATA <value>`
//! - `FAILED "<text>"` (request refused, session continues)
//! - `ERROR "<text>"` (protocol violation, session ends)

mod message;
mod command;
mod codec;

pub use message::{is_identifier, is_quoted_text, is_value, Message, MessageKind};
pub use command::{ArithOp, Command};
pub use codec::{decode, encode, read_message, write_message};

/// Maximum encoded message length, terminating newline included
pub const MAX_ENCODED_LEN: usize = 1024;
