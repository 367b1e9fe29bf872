//! Message definitions
//!
//! A message is a kind plus an ordered list of string arguments. Requests
//! and responses share the same representation.

use std::fmt;

use crate::error::{Result, TableKvError};
use super::MAX_ENCODED_LEN;

/// Message kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    // Requests
    Login,
    Create,
    Push,
    Pop,
    Top,
    Set,
    Get,
    Add,
    Sub,
    Mul,
    Div,
    Begin,
    Commit,
    Bye,

    // Responses
    Ok,
    Failed,
    Error,
    Data,
}

/// Grammar of a single argument position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgGrammar {
    Identifier,
    Value,
    QuotedText,
}

impl MessageKind {
    /// Every kind, in protocol order
    pub const ALL: [MessageKind; 18] = [
        MessageKind::Login,
        MessageKind::Create,
        MessageKind::Push,
        MessageKind::Pop,
        MessageKind::Top,
        MessageKind::Set,
        MessageKind::Get,
        MessageKind::Add,
        MessageKind::Sub,
        MessageKind::Mul,
        MessageKind::Div,
        MessageKind::Begin,
        MessageKind::Commit,
        MessageKind::Bye,
        MessageKind::Ok,
        MessageKind::Failed,
        MessageKind::Error,
        MessageKind::Data,
    ];

    /// The wire name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Login => "LOGIN",
            MessageKind::Create => "CREATE",
            MessageKind::Push => "PUSH",
            MessageKind::Pop => "POP",
            MessageKind::Top => "TOP",
            MessageKind::Set => "SET",
            MessageKind::Get => "GET",
            MessageKind::Add => "ADD",
            MessageKind::Sub => "SUB",
            MessageKind::Mul => "MUL",
            MessageKind::Div => "DIV",
            MessageKind::Begin => "BEGIN",
            MessageKind::Commit => "COMMIT",
            MessageKind::Bye => "BYE",
            MessageKind::Ok => "OK",
            MessageKind::Failed => "FAILED",
            MessageKind::Error => "ERROR",
            MessageKind::Data => "DATA",
        }
    }

    /// Look up a kind by its exact (case-sensitive) wire name
    pub fn from_name(name: &str) -> Option<MessageKind> {
        MessageKind::ALL.iter().copied().find(|kind| kind.as_str() == name)
    }

    /// Whether this kind is sent by clients
    pub fn is_request(&self) -> bool {
        !self.is_response()
    }

    /// Whether this kind is sent by the server
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            MessageKind::Ok | MessageKind::Failed | MessageKind::Error | MessageKind::Data
        )
    }

    /// Whether this kind's argument is quoted text on the wire
    pub fn has_quoted_text(&self) -> bool {
        matches!(self, MessageKind::Failed | MessageKind::Error)
    }

    fn grammar(&self) -> &'static [ArgGrammar] {
        use ArgGrammar::*;
        match self {
            MessageKind::Login | MessageKind::Create => &[Identifier],
            MessageKind::Push | MessageKind::Data => &[Value],
            MessageKind::Set | MessageKind::Get => &[Identifier, Identifier],
            MessageKind::Failed | MessageKind::Error => &[QuotedText],
            _ => &[],
        }
    }

    /// Number of arguments a well-formed message of this kind carries
    pub fn arity(&self) -> usize {
        self.grammar().len()
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    kind: MessageKind,
    args: Vec<String>,
}

impl Message {
    /// Create a message from a kind and its arguments
    pub fn new<I, S>(kind: MessageKind, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a message without arguments
    pub fn bare(kind: MessageKind) -> Self {
        Self { kind, args: Vec::new() }
    }

    /// Create an OK response
    pub fn ok() -> Self {
        Self::bare(MessageKind::Ok)
    }

    /// Create a DATA response carrying a value
    pub fn data(value: impl Into<String>) -> Self {
        Self::new(MessageKind::Data, [value])
    }

    /// Create a FAILED response
    ///
    /// The text is cleaned up and cut short so the reply always encodes.
    pub fn failed(text: &str) -> Self {
        Self::new(MessageKind::Failed, [reply_text(MessageKind::Failed, text)])
    }

    /// Create an ERROR response, with the same cleanup as [`Message::failed`]
    pub fn error(text: &str) -> Self {
        Self::new(MessageKind::Error, [reply_text(MessageKind::Error, text)])
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: MessageKind) {
        self.kind = kind;
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    pub fn push_arg(&mut self, arg: impl Into<String>) {
        self.args.push(arg.into());
    }

    pub fn into_args(self) -> Vec<String> {
        self.args
    }

    // -------------------------------------------------------------------------
    // Positional accessors
    // -------------------------------------------------------------------------

    /// LOGIN: the user name
    pub fn username(&self) -> Option<&str> {
        self.arg(0)
    }

    /// CREATE / SET / GET: the table name
    pub fn table(&self) -> Option<&str> {
        self.arg(0)
    }

    /// SET / GET: the key
    pub fn key(&self) -> Option<&str> {
        self.arg(1)
    }

    /// PUSH / DATA: the value
    pub fn value(&self) -> Option<&str> {
        self.arg(0)
    }

    /// FAILED / ERROR: the text, without its delimiting quotes
    pub fn quoted_text(&self) -> Option<&str> {
        self.arg(0)
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    /// Length of this message once encoded, terminator included
    pub fn encoded_len(&self) -> usize {
        let args: usize = self
            .args
            .iter()
            .map(|arg| {
                let quotes = if is_quoted_on_wire(self.kind, arg) { 2 } else { 0 };
                1 + arg.len() + quotes
            })
            .sum();
        self.kind.as_str().len() + args + 1
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Check arity, per-argument grammar and encoded length
    pub fn validate(&self) -> Result<()> {
        let grammar = self.kind.grammar();
        if self.args.len() != grammar.len() {
            return Err(TableKvError::invalid(format!(
                "{} expects {} argument(s), got {}",
                self.kind,
                grammar.len(),
                self.args.len()
            )));
        }

        for (arg, rule) in self.args.iter().zip(grammar) {
            let ok = match rule {
                ArgGrammar::Identifier => is_identifier(arg),
                ArgGrammar::Value => is_value(arg),
                ArgGrammar::QuotedText => is_quoted_text(arg),
            };
            if !ok {
                return Err(TableKvError::invalid(format!(
                    "{} has a malformed argument",
                    self.kind
                )));
            }
        }

        let len = self.encoded_len();
        if len > MAX_ENCODED_LEN {
            return Err(TableKvError::invalid(format!(
                "{} is too long ({} bytes, max {})",
                self.kind, len, MAX_ENCODED_LEN
            )));
        }

        Ok(())
    }
}

/// Letter first, then letters, digits, underscores or spaces
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ')
}

/// Any non-empty token without whitespace that does not open with `"`
pub fn is_value(s: &str) -> bool {
    !s.is_empty() && !s.starts_with('"') && !s.chars().any(char::is_whitespace)
}

/// No `"` other than backslash-escaped ones
pub fn is_quoted_text(s: &str) -> bool {
    let mut escaped = false;
    for c in s.chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return false,
            _ => {}
        }
    }
    // A trailing backslash would escape the closing delimiter
    !escaped
}

/// Whether `arg` is wrapped in quotes when encoded
///
/// Quoted text always is; identifiers are when they contain a space.
pub(crate) fn is_quoted_on_wire(kind: MessageKind, arg: &str) -> bool {
    kind.has_quoted_text() || arg.contains(' ')
}

/// FAILED / ERROR text that passes validation and fits in one line
fn reply_text(kind: MessageKind, text: &str) -> String {
    // kind, space, two quotes, newline
    let budget = MAX_ENCODED_LEN - kind.as_str().len() - 4;

    let mut cleaned: String = text
        .chars()
        .map(|c| match c {
            '"' => '\'',
            '\n' | '\r' => ' ',
            other => other,
        })
        .collect();

    if cleaned.len() > budget {
        let mut end = budget;
        while !cleaned.is_char_boundary(end) {
            end -= 1;
        }
        cleaned.truncate(end);
    }

    while cleaned.ends_with('\\') {
        cleaned.pop();
    }
    cleaned
}
