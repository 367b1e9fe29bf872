//! # TableKV
//!
//! A multi-client, in-memory table store with:
//! - Named string-to-string tables
//! - A per-connection operand stack for composing values
//! - Lock-based transactions with rollback across several tables
//! - A line-oriented TCP protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │              (one worker thread per client)                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  lines ⇄ Message (protocol codec)
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Session                                 │
//! │    login · operand stack · autocommit / transaction          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Registry   │─────────▶│   Table     │
//!   │  (Mutex)    │  Arc     │ (Mutex +    │
//!   └─────────────┘          │  undo log)  │
//!                            └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod stack;
pub mod store;
pub mod session;
pub mod network;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{TableKvError, Result};
pub use config::Config;
pub use session::Session;
pub use store::TableRegistry;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of TableKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
