//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//! ```text
//! ┌────────┬───┬───────┬───┬───────┬────┐
//! │  KIND  │ ␠ │ arg 1 │ ␠ │ arg 2 │ \n │   (at most 1024 bytes)
//! └────────┴───┴───────┴───┴───────┴────┘
//! ```
//!
//! FAILED and ERROR carry one argument wrapped in double quotes so it may
//! contain spaces; identifiers containing spaces are quoted the same way.
//! Decoding is lenient about whitespace between tokens.

use std::io::{BufRead, Read, Write};

use crate::error::{Result, TableKvError};
use super::message::is_quoted_on_wire;
use super::{Message, MessageKind, MAX_ENCODED_LEN};

// =============================================================================
// Message Encoding/Decoding
// =============================================================================

/// Encode a message to its line form, terminator included
pub fn encode(message: &Message) -> Result<String> {
    let mut line = String::with_capacity(message.encoded_len());
    line.push_str(message.kind().as_str());
    for arg in message.args() {
        line.push(' ');
        if is_quoted_on_wire(message.kind(), arg) {
            line.push('"');
            line.push_str(arg);
            line.push('"');
        } else {
            line.push_str(arg);
        }
    }
    line.push('\n');

    if line.len() > MAX_ENCODED_LEN {
        return Err(TableKvError::MessageTooLong {
            len: line.len(),
            max: MAX_ENCODED_LEN,
        });
    }

    Ok(line)
}

/// Decode one line (terminator included) into a validated message
pub fn decode(line: &str) -> Result<Message> {
    if line.len() > MAX_ENCODED_LEN {
        return Err(TableKvError::invalid(format!(
            "message is too long ({} bytes, max {})",
            line.len(),
            MAX_ENCODED_LEN
        )));
    }

    let body = line
        .strip_suffix('\n')
        .ok_or_else(|| TableKvError::invalid("message lacks terminating newline"))?;
    let body = body.strip_suffix('\r').unwrap_or(body);

    let mut tokens = tokenize(body)?.into_iter();

    let name = tokens
        .next()
        .ok_or_else(|| TableKvError::invalid("empty message"))?;
    let kind = MessageKind::from_name(&name)
        .ok_or_else(|| TableKvError::invalid("unrecognized message kind"))?;

    let mut message = Message::bare(kind);
    for token in tokens {
        message.push_arg(token);
    }

    message.validate()?;
    Ok(message)
}

/// Split a line body into tokens
///
/// A token starting with `"` runs to the next unescaped `"`; the delimiters
/// are dropped and escapes are kept verbatim.
fn tokenize(body: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut chars = body.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_ascii_whitespace() {
            chars.next();
            continue;
        }

        if c == '"' {
            chars.next();
            let open = start + 1;
            let mut close = None;
            let mut escaped = false;
            for (i, c) in chars.by_ref() {
                match c {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => {
                        close = Some(i);
                        break;
                    }
                    _ => {}
                }
            }
            let close =
                close.ok_or_else(|| TableKvError::invalid("unterminated quoted text"))?;
            tokens.push(body[open..close].to_string());
        } else {
            let mut end = body.len();
            while let Some(&(i, c)) = chars.peek() {
                if c.is_ascii_whitespace() {
                    end = i;
                    break;
                }
                chars.next();
            }
            tokens.push(body[start..end].to_string());
        }
    }

    Ok(tokens)
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one message from a stream
///
/// Blocks until a full line is received. Returns `Ok(None)` when the peer
/// closed the stream before sending anything.
pub fn read_message<R: BufRead>(reader: &mut R) -> Result<Option<Message>> {
    let mut buf = Vec::with_capacity(64);
    let limit = (MAX_ENCODED_LEN + 1) as u64;
    let n = reader.by_ref().take(limit).read_until(b'\n', &mut buf)?;

    if n == 0 {
        return Ok(None);
    }

    let line = String::from_utf8(buf)
        .map_err(|_| TableKvError::invalid("message is not valid UTF-8"))?;
    decode(&line).map(Some)
}

/// Write a message to a stream and flush it
pub fn write_message<W: Write>(writer: &mut W, message: &Message) -> Result<()> {
    let line = encode(message)?;
    writer.write_all(line.as_bytes())?;
    writer.flush()?;
    Ok(())
}
