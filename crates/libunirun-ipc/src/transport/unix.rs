use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use libunirun_core::paths::current_uid;
use tokio::net::{UnixListener, UnixStream};
use tracing::debug;

use super::ChannelAddress;
use crate::error::IpcError;

/// Server side of one accepted connection
pub type InboundStream = UnixStream;

/// Client side of a connection to the leader
pub type OutboundStream = UnixStream;

/// Bound socket the leader accepts endpoints from
#[derive(Debug)]
pub struct Rendezvous {
    listener: UnixListener,
    path: PathBuf,
}

impl Rendezvous {
    /// Bind the channel socket, replacing any stale socket file.
    ///
    /// Only the lock holder may call this: removing the old file is safe
    /// because no other live leader can exist for the scope.
    pub fn bind(address: &ChannelAddress) -> Result<Self, IpcError> {
        let path = address.socket_path().to_path_buf();
        let bind_err = |source| IpcError::Bind {
            endpoint: path.display().to_string(),
            source,
        };

        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "Removed stale socket"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(bind_err(e)),
        }

        let listener = UnixListener::bind(&path).map_err(bind_err)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
            .map_err(bind_err)?;

        Ok(Self { listener, path })
    }

    /// Wait for the next client and hand back its stream.
    ///
    /// Clients running as another OS user are rejected.
    pub async fn accept(&mut self) -> Result<InboundStream, IpcError> {
        let (stream, _) = self.listener.accept().await?;
        let peer = stream.peer_cred()?;
        if peer.uid() != current_uid() {
            return Err(IpcError::ForeignPeer { uid: peer.uid() });
        }
        Ok(stream)
    }
}

impl Drop for Rendezvous {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Single connection attempt
pub async fn connect(address: &ChannelAddress) -> io::Result<OutboundStream> {
    UnixStream::connect(address.socket_path()).await
}

/// Whether a connect error just means the leader is not accepting yet
pub fn is_waiting_for_server(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused
    )
}

/// Fails when the peer already went away
pub fn check_connected(stream: &OutboundStream) -> io::Result<()> {
    stream.peer_addr().map(|_| ())
}
