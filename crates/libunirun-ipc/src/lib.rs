//! Leader/follower argument relay for unirun
//!
//! This crate provides:
//! - The payload wire format (Payload)
//! - Platform channel transport (Unix sockets, Windows named pipes)
//! - Dispatch targets for callback invocations (DirectDispatch, DispatchQueue)
//! - The leader's listen loop (Listener, ListenerHandle)
//! - The follower's best-effort sender (send_payload)

pub mod dispatch;
pub mod error;
pub mod listener;
pub mod payload;
pub mod sender;
pub mod transport;

pub use dispatch::{dispatch_queue, Callback, DirectDispatch, Dispatch, DispatchPump, DispatchQueue, Job};
pub use error::IpcError;
pub use listener::{Listener, ListenerHandle, ListenerOptions, ListenerState};
pub use payload::Payload;
pub use sender::{send_payload, try_send_payload};
pub use transport::ChannelAddress;
