//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{self, BufReader, BufWriter};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, TableKvError};
use crate::protocol::{read_message, write_message, Message};
use crate::session::Session;
use crate::store::TableRegistry;

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for line reads)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered, flushed after every reply)
    writer: BufWriter<TcpStream>,

    /// Protocol state for this client
    session: Session,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O and a fresh session
    pub fn new(stream: TcpStream, registry: Arc<TableRegistry>) -> Result<Self> {
        // Get peer address for logging before we split the stream
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Replies are small and latency bound
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            session: Session::new(registry),
            peer_addr,
        })
    }

    /// Configure connection timeouts (0 leaves the socket blocking forever)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        let read_stream = self.reader.get_ref();
        let write_stream = self.writer.get_ref();

        if read_ms > 0 {
            read_stream.set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            write_stream.set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }

        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads requests in a loop and sends replies. Returns when the client
    /// says BYE, disconnects, or breaks the protocol.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        loop {
            let request = match read_message(&mut self.reader) {
                Ok(Some(message)) => message,
                Ok(None) => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Err(TableKvError::Io(ref e)) if is_disconnect(e) => {
                    tracing::debug!("Client {} went away: {}", self.peer_addr, e);
                    return Ok(());
                }
                Err(e) if e.is_invalid_message() => {
                    tracing::warn!("Invalid message from {}: {}", self.peer_addr, e);
                    if let Err(send_err) = self.send_response(&Message::error(&e.to_string())) {
                        tracing::debug!(
                            "Could not send ERROR to {}: {}",
                            self.peer_addr,
                            send_err
                        );
                    }
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    return Err(e);
                }
            };

            tracing::trace!("Received from {}: {:?}", self.peer_addr, request);

            let (reply, keep_open) = match self.session.handle(request) {
                Ok(reply) => (reply, !self.session.is_finished()),
                Err(e) if e.is_recoverable() => (Message::failed(&e.to_string()), true),
                Err(e) if e.is_invalid_message() => {
                    tracing::warn!("Protocol violation by {}: {}", self.peer_addr, e);
                    (Message::error(&e.to_string()), false)
                }
                Err(e) => {
                    tracing::warn!("Closing {} after unexpected error: {}", self.peer_addr, e);
                    return Err(e);
                }
            };

            tracing::trace!("Replying to {}: {:?}", self.peer_addr, reply);

            if let Err(e) = self.send_response(&reply) {
                // If the client disconnected before we could send the reply,
                // log and exit gracefully rather than treating it as a server error.
                if let TableKvError::Io(ref io_err) = e {
                    if is_disconnect(io_err) {
                        tracing::debug!(
                            "Client {} disconnected before reply could be sent: {}",
                            self.peer_addr,
                            e
                        );
                        return Ok(());
                    }
                }
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }

            if !keep_open {
                tracing::debug!("Closing connection to {}", self.peer_addr);
                return Ok(());
            }
        }
    }

    /// Send a reply to the client
    fn send_response(&mut self, reply: &Message) -> Result<()> {
        write_message(&mut self.writer, reply)
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

/// Errors that just mean the peer is gone (or too slow, with timeouts on)
fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}
