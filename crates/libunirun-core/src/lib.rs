//! Core types for unirun single-instance arbitration
//!
//! This crate provides:
//! - Scope identity derivation (ScopeIdentity)
//! - OS account lookup and derived lock/channel names (OsAccount, ScopeNames)
//! - Per-user runtime directory resolution
//! - The memoizing instance arbitrator (Arbiter, InstanceRole)
//! - Activator configuration (ActivatorConfig)

pub mod arbiter;
pub mod config;
pub mod error;
pub mod identity;
pub mod paths;
pub mod scope;

pub use arbiter::{Arbiter, Decision, InstanceLock, InstanceRole};
pub use config::{load_config, save_config, ActivatorConfig};
pub use error::CoreError;
pub use identity::ScopeIdentity;
pub use scope::{OsAccount, ScopeNames};

/// Default follower connect window in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3_000;

/// Default leader per-connection read bound in milliseconds
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5_000;

/// Default maximum encoded payload size in bytes
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Prefix of the arbitration lock name
pub const LOCK_NAME_PREFIX: &str = "Mutex";

/// Prefix of the channel name
pub const CHANNEL_NAME_PREFIX: &str = "Pipe";
