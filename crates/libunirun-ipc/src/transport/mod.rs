//! Platform channel transport
//!
//! - Unix: a socket file in the per-user runtime directory. The bound listener
//!   is the rendezvous; every accepted stream is a single-use endpoint.
//! - Windows: a named pipe. Every endpoint is a fresh inbound-only pipe
//!   instance, created after the previous one is dropped.

use std::fmt;
use std::path::Path;

use libunirun_core::ScopeNames;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use self::unix::{check_connected, connect, is_waiting_for_server, InboundStream, OutboundStream, Rendezvous};

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use self::windows::{check_connected, connect, is_waiting_for_server, InboundStream, OutboundStream, Rendezvous};

/// Where the leader listens for one scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelAddress {
    #[cfg(unix)]
    path: std::path::PathBuf,
    #[cfg(windows)]
    pipe_name: String,
}

impl ChannelAddress {
    #[cfg(unix)]
    pub fn new(runtime_dir: &Path, names: &ScopeNames) -> Self {
        Self {
            path: libunirun_core::paths::socket_path(runtime_dir, names),
        }
    }

    #[cfg(windows)]
    pub fn new(_runtime_dir: &Path, names: &ScopeNames) -> Self {
        Self {
            pipe_name: libunirun_core::paths::pipe_name(names),
        }
    }

    /// Socket file backing this address
    #[cfg(unix)]
    pub fn socket_path(&self) -> &Path {
        &self.path
    }

    #[cfg(windows)]
    pub fn pipe_name(&self) -> &str {
        &self.pipe_name
    }
}

impl fmt::Display for ChannelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[cfg(unix)]
        {
            write!(f, "{}", self.path.display())
        }
        #[cfg(windows)]
        {
            f.write_str(&self.pipe_name)
        }
    }
}
