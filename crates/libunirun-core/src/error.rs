//! Core error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while deriving a scope or claiming leadership.
///
/// Every variant is fatal for the entry operation: there is no degraded role.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The running executable's path could not be determined
    #[error("cannot determine executable path: {0}")]
    ExecutablePath(#[source] std::io::Error),

    /// A caller-supplied name is unusable
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// The exclusive lock could not be created (naming or permission failure)
    #[error("failed to create instance lock at {}: {source}", path.display())]
    LockCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The runtime directory could not be created
    #[error("failed to prepare runtime directory {}: {source}", path.display())]
    RuntimeDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The runtime directory exists but belongs to someone else
    #[error("runtime directory {} is owned by uid {owner}, not the current user", path.display())]
    RuntimeDirInsecure { path: PathBuf, owner: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl CoreError {
    /// Short machine-readable code, used in log fields
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::ExecutablePath(_) => "executable_path",
            CoreError::InvalidName(_) => "invalid_name",
            CoreError::LockCreate { .. } => "lock_create",
            CoreError::RuntimeDir { .. } => "runtime_dir",
            CoreError::RuntimeDirInsecure { .. } => "runtime_dir_insecure",
            CoreError::Io(_) => "io_error",
            CoreError::TomlParse(_) => "invalid_config",
            CoreError::TomlSerialize(_) => "internal_error",
        }
    }
}
