//! Error types for TableKV
//!
//! Provides a unified error type for all operations.
//!
//! The protocol distinguishes two tiers of failure. Recoverable errors
//! (`Operation`, `FailedTransaction`) are answered with `FAILED` and the
//! session continues. Everything else ends the session: invalid input is
//! answered with `ERROR` first, transport failures are not answered at all.

use thiserror::Error;

/// Result type alias using TableKvError
pub type Result<T> = std::result::Result<T, TableKvError>;

/// Unified error type for TableKV operations
#[derive(Debug, Error)]
pub enum TableKvError {
    // -------------------------------------------------------------------------
    // Communication Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("{0}")]
    InvalidMessage(String),

    #[error("message is too long ({len} bytes, max {max})")]
    MessageTooLong { len: usize, max: usize },

    // -------------------------------------------------------------------------
    // Request Errors
    // -------------------------------------------------------------------------
    #[error("{0}")]
    Operation(String),

    #[error("{0}")]
    FailedTransaction(String),

    // -------------------------------------------------------------------------
    // Client Errors
    // -------------------------------------------------------------------------
    /// The server answered a request with FAILED or ERROR
    #[error("server error: {0}")]
    Server(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TableKvError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        TableKvError::InvalidMessage(message.into())
    }

    pub(crate) fn operation(message: impl Into<String>) -> Self {
        TableKvError::Operation(message.into())
    }

    /// Whether a session may continue after replying to this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TableKvError::Operation(_) | TableKvError::FailedTransaction(_)
        )
    }

    /// Whether this error means the peer sent something outside the protocol
    pub fn is_invalid_message(&self) -> bool {
        matches!(
            self,
            TableKvError::InvalidMessage(_) | TableKvError::MessageTooLong { .. }
        )
    }
}
