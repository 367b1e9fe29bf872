//! Client Module
//!
//! Blocking request/response helpers over the line protocol, plus the
//! scripted exchanges used by the command-line tool.

use std::io::{self, BufReader, BufWriter, Write};
use std::net::{TcpStream, ToSocketAddrs};

use crate::error::{Result, TableKvError};
use crate::protocol::{read_message, write_message, ArithOp, Command, Message, MessageKind};

/// A connection to a TableKV server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    /// Connect to a server
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;

        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
        })
    }

    /// Send a message and return the raw reply, whatever its kind
    pub fn send(&mut self, message: &Message) -> Result<Message> {
        write_message(&mut self.writer, message)?;
        self.read_reply()
    }

    /// Send one line of protocol text verbatim and return the raw reply
    pub fn send_line(&mut self, line: &str) -> Result<Message> {
        self.writer.write_all(line.as_bytes())?;
        if !line.ends_with('\n') {
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()?;
        self.read_reply()
    }

    fn read_reply(&mut self) -> Result<Message> {
        read_message(&mut self.reader)?.ok_or_else(|| {
            TableKvError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            ))
        })
    }

    /// Send a command, turning FAILED / ERROR into `TableKvError::Server`
    pub fn request(&mut self, command: Command) -> Result<Message> {
        let reply = self.send(&command.into())?;
        match reply.kind() {
            MessageKind::Failed | MessageKind::Error => Err(TableKvError::Server(
                reply.quoted_text().unwrap_or_default().to_string(),
            )),
            _ => Ok(reply),
        }
    }

    fn expect_ok(&mut self, command: Command) -> Result<()> {
        let kind = command.kind();
        let reply = self.request(command)?;
        if reply.kind() != MessageKind::Ok {
            return Err(TableKvError::invalid(format!(
                "unexpected {} reply to {}",
                reply.kind(),
                kind
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Protocol operations
    // =========================================================================

    pub fn login(&mut self, username: &str) -> Result<()> {
        self.expect_ok(Command::Login {
            username: username.to_string(),
        })
    }

    pub fn create(&mut self, table: &str) -> Result<()> {
        self.expect_ok(Command::Create {
            table: table.to_string(),
        })
    }

    pub fn push(&mut self, value: &str) -> Result<()> {
        self.expect_ok(Command::Push {
            value: value.to_string(),
        })
    }

    pub fn pop(&mut self) -> Result<()> {
        self.expect_ok(Command::Pop)
    }

    /// Read the top of the server-side stack
    pub fn top(&mut self) -> Result<String> {
        let reply = self.request(Command::Top)?;
        match (reply.kind(), reply.value()) {
            (MessageKind::Data, Some(value)) => Ok(value.to_string()),
            (kind, _) => Err(TableKvError::invalid(format!(
                "unexpected {} reply to TOP",
                kind
            ))),
        }
    }

    /// Pop the stack top into `table[key]`
    pub fn set(&mut self, table: &str, key: &str) -> Result<()> {
        self.expect_ok(Command::Set {
            table: table.to_string(),
            key: key.to_string(),
        })
    }

    /// Push `table[key]` onto the stack
    pub fn get(&mut self, table: &str, key: &str) -> Result<()> {
        self.expect_ok(Command::Get {
            table: table.to_string(),
            key: key.to_string(),
        })
    }

    pub fn arith(&mut self, op: ArithOp) -> Result<()> {
        self.expect_ok(Command::Arith(op))
    }

    pub fn begin(&mut self) -> Result<()> {
        self.expect_ok(Command::Begin)
    }

    pub fn commit(&mut self) -> Result<()> {
        self.expect_ok(Command::Commit)
    }

    /// End the session; the server closes the connection afterwards
    pub fn bye(mut self) -> Result<()> {
        self.expect_ok(Command::Bye)
    }
}

// =============================================================================
// Scripted exchanges
// =============================================================================

/// LOGIN, GET, TOP, BYE: fetch one value
pub fn get_value(
    addr: impl ToSocketAddrs,
    username: &str,
    table: &str,
    key: &str,
) -> Result<String> {
    let mut client = Client::connect(addr)?;
    client.login(username)?;
    client.get(table, key)?;
    let value = client.top()?;
    client.bye()?;
    Ok(value)
}

/// LOGIN, PUSH, SET, BYE: store one value
pub fn set_value(
    addr: impl ToSocketAddrs,
    username: &str,
    table: &str,
    key: &str,
    value: &str,
) -> Result<()> {
    let mut client = Client::connect(addr)?;
    client.login(username)?;
    client.push(value)?;
    client.set(table, key)?;
    client.bye()
}

/// LOGIN, [BEGIN], GET, PUSH 1, ADD, TOP, SET, [COMMIT], BYE
///
/// Returns the incremented value.
pub fn incr_value(
    addr: impl ToSocketAddrs,
    username: &str,
    table: &str,
    key: &str,
    transactional: bool,
) -> Result<String> {
    let mut client = Client::connect(addr)?;
    client.login(username)?;
    if transactional {
        client.begin()?;
    }
    client.get(table, key)?;
    client.push("1")?;
    client.arith(ArithOp::Add)?;
    let value = client.top()?;
    client.set(table, key)?;
    if transactional {
        client.commit()?;
    }
    client.bye()?;
    Ok(value)
}
