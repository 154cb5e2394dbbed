use std::io;

use tokio::net::windows::named_pipe::{
    ClientOptions, NamedPipeClient, NamedPipeServer, PipeMode, ServerOptions,
};

use super::ChannelAddress;
use crate::error::IpcError;

const ERROR_PIPE_BUSY: i32 = 231;

/// Server side of one accepted connection
pub type InboundStream = NamedPipeServer;

/// Client side of a connection to the leader
pub type OutboundStream = NamedPipeClient;

/// Source of fresh single-use pipe instances
#[derive(Debug)]
pub struct Rendezvous {
    pipe_name: String,
    next: Option<NamedPipeServer>,
}

impl Rendezvous {
    /// Create the first pipe instance; fails if someone already owns the name
    pub fn bind(address: &ChannelAddress) -> Result<Self, IpcError> {
        let pipe_name = address.pipe_name().to_string();
        let first = create_instance(&pipe_name, true).map_err(|source| IpcError::Bind {
            endpoint: pipe_name.clone(),
            source,
        })?;
        Ok(Self {
            pipe_name,
            next: Some(first),
        })
    }

    /// Wait for a client on a new pipe instance
    pub async fn accept(&mut self) -> Result<InboundStream, IpcError> {
        let server = match self.next.take() {
            Some(server) => server,
            None => create_instance(&self.pipe_name, false)?,
        };
        server.connect().await?;
        Ok(server)
    }
}

/// One inbound-only instance; at most one exists at a time per pipe name.
///
/// Remote clients are refused. The pipe keeps the default security descriptor,
/// so unlike the Unix socket it is not restricted to the current user.
fn create_instance(pipe_name: &str, first: bool) -> io::Result<NamedPipeServer> {
    ServerOptions::new()
        .first_pipe_instance(first)
        .max_instances(1)
        .access_inbound(true)
        .access_outbound(false)
        .pipe_mode(PipeMode::Byte)
        .reject_remote_clients(true)
        .create(pipe_name)
}

/// Single connection attempt
pub async fn connect(address: &ChannelAddress) -> io::Result<OutboundStream> {
    ClientOptions::new()
        .read(false)
        .write(true)
        .open(address.pipe_name())
}

/// Whether a connect error just means the leader is not accepting yet
pub fn is_waiting_for_server(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound || err.raw_os_error() == Some(ERROR_PIPE_BUSY)
}

/// Fails when the pipe already went away
pub fn check_connected(stream: &OutboundStream) -> io::Result<()> {
    stream.info().map(|_| ())
}
