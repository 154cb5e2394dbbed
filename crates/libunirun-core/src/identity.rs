//! Scope identity derivation
//!
//! A scope identity decides which processes count as "the same application".
//! It is either the caller's explicit name or a SHA-256 digest of the running
//! executable's absolute path.

use std::fmt;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::CoreError;

/// String identifying one arbitration scope
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeIdentity(String);

impl ScopeIdentity {
    /// Use `explicit` verbatim when given, otherwise hash the current executable path
    pub fn derive(explicit: Option<&str>) -> Result<Self, CoreError> {
        match explicit {
            Some(name) => Self::explicit(name),
            None => Self::from_current_executable(),
        }
    }

    /// Wrap a caller-supplied name
    pub fn explicit(name: &str) -> Result<Self, CoreError> {
        if name.is_empty() {
            return Err(CoreError::InvalidName(
                "unique name must not be empty".to_string(),
            ));
        }
        Ok(Self(name.to_string()))
    }

    /// Hash the absolute path of the running executable
    pub fn from_current_executable() -> Result<Self, CoreError> {
        let exe = std::env::current_exe().map_err(CoreError::ExecutablePath)?;
        Ok(Self::from_executable_path(&exe))
    }

    /// Pure digest of an executable path, lowercase hex
    pub fn from_executable_path(path: &Path) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(path.to_string_lossy().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ScopeIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
