//! Entlock Common - Shared types, error codes, and key derivation
//!
//! This crate provides the foundational types used across all entlock components:
//! - Error types and error codes
//! - Entity references and the lock key codec
//! - Locker configuration and per-call lock options
//! - Paging parameters for listing

pub mod config;
pub mod error;
pub mod key;
pub mod model;

// Re-exports for convenience
pub use config::{Engine, LockOptions, LockerConfig, RemoteBulkMode, ResolvedOptions};
pub use error::{ErrorCode, LastError, LockError, Result};
pub use key::{BatchRef, EntityRef, LockKeyCodec, LockTarget};
pub use model::PageParam;

/// Delimiter between the identity fields of a lock key
pub const KEY_DELIMITER: char = ':';

/// Owner label used when the caller does not supply one
pub const DEFAULT_OWNER: &str = "entlock";

/// Default lock TTL in milliseconds
pub const DEFAULT_TTL_MS: u64 = 30000;
