//! IPC error types

use thiserror::Error;

/// Errors that can occur on the leader/follower channel.
///
/// None of these reach application code through the entry operation: the
/// listener logs and drops the connection, the sender logs and gives up.
#[derive(Error, Debug)]
pub enum IpcError {
    /// The leader could not create its channel
    #[error("Failed to bind channel {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connect or transfer timed out
    #[error("Timed out after {0}ms")]
    Timeout(u64),

    /// The channel was gone by the time we checked it
    #[error("Channel not connected")]
    NotConnected,

    /// A process of another OS user connected
    #[error("Rejected connection from uid {uid}")]
    ForeignPeer { uid: u32 },

    /// The payload exceeded the configured limit
    #[error("Payload larger than {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
