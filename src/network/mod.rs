//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single blocking acceptor
//! - One worker thread per connection, each owning its `Session`
//! - Tables reached through the shared `TableRegistry`

mod server;
mod connection;

pub use server::{Server, ShutdownHandle};
pub use connection::Connection;
