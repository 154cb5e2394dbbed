//! Follower-side sender
//!
//! Best effort by contract: the follower exits whether or not the leader got
//! its arguments, so failures are logged and swallowed. There is no retry once
//! the connect window has elapsed.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::IpcError;
use crate::payload::{write_payload, Payload};
use crate::transport::{self, ChannelAddress, OutboundStream};

const INITIAL_CONNECT_DELAY: Duration = Duration::from_millis(10);
const MAX_CONNECT_DELAY: Duration = Duration::from_millis(100);

/// Send `payload` to the leader, logging instead of returning failures
pub async fn send_payload(address: &ChannelAddress, payload: &Payload, timeout: Duration) {
    match try_send_payload(address, payload, timeout).await {
        Ok(()) => debug!(
            endpoint = %address,
            args = payload.args().len(),
            "Forwarded arguments to leader"
        ),
        Err(e) => warn!(endpoint = %address, "Could not forward arguments: {}", e),
    }
}

/// Send `payload` to the leader.
///
/// Connecting and writing share one deadline `timeout` from now; the payload
/// is written and the connection closed before it, or the send fails.
pub async fn try_send_payload(
    address: &ChannelAddress,
    payload: &Payload,
    timeout: Duration,
) -> Result<(), IpcError> {
    let timeout_ms = timeout.as_millis() as u64;
    let deadline = Instant::now() + timeout;

    let mut stream = tokio::time::timeout_at(deadline, connect_when_ready(address))
        .await
        .map_err(|_| IpcError::Timeout(timeout_ms))??;

    transport::check_connected(&stream).map_err(|_| IpcError::NotConnected)?;

    tokio::time::timeout_at(deadline, write_payload(&mut stream, payload))
        .await
        .map_err(|_| IpcError::Timeout(timeout_ms))?
}

/// Connect, waiting out "no endpoint yet" with bounded backoff
async fn connect_when_ready(address: &ChannelAddress) -> Result<OutboundStream, IpcError> {
    let mut delay = INITIAL_CONNECT_DELAY;
    loop {
        match transport::connect(address).await {
            Ok(stream) => return Ok(stream),
            Err(e) if transport::is_waiting_for_server(&e) => {
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_CONNECT_DELAY);
            }
            Err(e) => return Err(IpcError::ConnectionFailed(e.to_string())),
        }
    }
}
