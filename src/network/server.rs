//! TCP Server
//!
//! Accepts connections and dispatches each one to its own worker thread.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::error::{Result, TableKvError};
use crate::store::TableRegistry;
use super::Connection;

/// TCP server for TableKV
pub struct Server {
    config: Config,
    registry: Arc<TableRegistry>,
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,

    /// Number of live worker threads
    active: Arc<AtomicUsize>,
}

impl Server {
    /// Create a new server with the given config and registry, binding the listener
    pub fn new(config: Config, registry: Arc<TableRegistry>) -> Result<Self> {
        if config.max_connections == 0 {
            return Err(TableKvError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }

        let listener = TcpListener::bind(&config.listen_addr)?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            config,
            registry,
            listener,
            shutdown: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> &Arc<TableRegistry> {
        &self.registry
    }

    /// A handle that can stop `run` from another thread
    pub fn shutdown_handle(&self) -> Result<ShutdownHandle> {
        Ok(ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
            addr: self.local_addr()?,
        })
    }

    /// Start the server (blocking)
    ///
    /// Accept failures are logged and skipped. Returns once a shutdown
    /// handle has fired; connections already accepted keep running.
    pub fn run(&mut self) -> Result<()> {
        loop {
            let accepted = self.listener.accept();

            if self.shutdown.load(Ordering::SeqCst) {
                tracing::info!("Shutdown requested, no longer accepting connections");
                return Ok(());
            }

            match accepted {
                Ok((stream, addr)) => self.dispatch(stream, addr),
                Err(e) => tracing::warn!("Failed to accept connection: {}", e),
            }
        }
    }

    /// Hand a fresh connection to its own worker thread
    fn dispatch(&self, stream: TcpStream, addr: SocketAddr) {
        if self.active.load(Ordering::SeqCst) >= self.config.max_connections {
            tracing::warn!(
                "Connection limit ({}) reached, dropping {}",
                self.config.max_connections,
                addr
            );
            return;
        }

        let registry = Arc::clone(&self.registry);
        let active = Arc::clone(&self.active);
        let read_ms = self.config.read_timeout_ms;
        let write_ms = self.config.write_timeout_ms;

        self.active.fetch_add(1, Ordering::SeqCst);
        let spawned = thread::Builder::new()
            .name(format!("client-{}", addr))
            .spawn(move || {
                let _slot = ActiveSlot(active);
                serve(stream, registry, read_ms, write_ms);
            });

        if let Err(e) = spawned {
            // The closure (and with it the stream) is gone, so is the client
            tracing::warn!("Could not start worker for {}: {}", addr, e);
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Worker body: run one connection to completion
fn serve(stream: TcpStream, registry: Arc<TableRegistry>, read_ms: u64, write_ms: u64) {
    let mut connection = match Connection::new(stream, registry) {
        Ok(connection) => connection,
        Err(e) => {
            tracing::warn!("Failed to set up connection: {}", e);
            return;
        }
    };

    if let Err(e) = connection.set_timeouts(read_ms, write_ms) {
        tracing::warn!("Failed to configure {}: {}", connection.peer_addr(), e);
        return;
    }

    if let Err(e) = connection.handle() {
        tracing::warn!("Connection {} ended with error: {}", connection.peer_addr(), e);
    }
}

/// Decrements the live-worker count when a worker exits, panics included
struct ActiveSlot(Arc<AtomicUsize>);

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Stops a running [`Server`] from another thread
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    addr: SocketAddr,
}

impl ShutdownHandle {
    /// Signal the server to stop accepting connections
    pub fn shutdown(&self) {
        tracing::info!("Shutting down server on {}", self.addr);
        self.flag.store(true, Ordering::SeqCst);

        // accept() is blocking; poke it with a throwaway connection
        let mut wake = self.addr;
        if wake.ip().is_unspecified() {
            match wake {
                SocketAddr::V4(_) => wake.set_ip(Ipv4Addr::LOCALHOST.into()),
                SocketAddr::V6(_) => wake.set_ip(Ipv6Addr::LOCALHOST.into()),
            }
        }
        let _ = TcpStream::connect_timeout(&wake, Duration::from_secs(1));
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
