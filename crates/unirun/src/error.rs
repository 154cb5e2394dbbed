//! Entry-operation error types

use thiserror::Error;

/// Errors returned by the `Activator` entry operations.
///
/// Only failures that leave the process without a role surface here; channel
/// trouble after the role is decided is logged, never returned.
#[derive(Error, Debug)]
pub enum UnirunError {
    /// Identity derivation, runtime directory or lock failure
    #[error("{0}")]
    Core(#[from] libunirun_core::CoreError),

    /// A private runtime for the blocking entry point could not be built
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl UnirunError {
    pub fn error_code(&self) -> &'static str {
        match self {
            UnirunError::Core(e) => e.error_code(),
            UnirunError::Runtime(_) => "runtime_error",
        }
    }
}
