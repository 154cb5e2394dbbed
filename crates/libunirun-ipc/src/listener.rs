//! Leader-side listen loop
//!
//! The loop is a two-state machine:
//! - `Listening`: wait for one client, read one payload, dispatch it, drop the
//!   endpoint and wait again
//! - `Terminated`: the endpoint was torn down (handle shut down or dropped) or
//!   the channel could not be bound
//!
//! Per-connection failures (foreign peer, malformed or oversized payload, slow
//! or vanished client) are logged and the loop keeps listening.

use std::sync::Arc;
use std::time::Duration;

use libunirun_core::{DEFAULT_MAX_PAYLOAD_BYTES, DEFAULT_READ_TIMEOUT_MS};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::dispatch::{Callback, DirectDispatch, Dispatch};
use crate::error::IpcError;
use crate::payload::{read_payload, Payload};
use crate::transport::{ChannelAddress, Rendezvous};

/// Pause after a failed accept so a persistent error cannot spin
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Observable state of a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Listening,
    Terminated,
}

/// Per-connection limits
#[derive(Debug, Clone)]
pub struct ListenerOptions {
    pub read_timeout: Duration,
    pub max_payload_bytes: usize,
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

/// Owner's handle on a running listener.
///
/// Dropping the handle tears the endpoint down just like `shutdown`.
#[derive(Debug)]
pub struct ListenerHandle {
    address: ChannelAddress,
    shutdown_tx: broadcast::Sender<()>,
    state_rx: watch::Receiver<ListenerState>,
}

impl ListenerHandle {
    pub fn address(&self) -> &ChannelAddress {
        &self.address
    }

    pub fn state(&self) -> ListenerState {
        // A vanished loop (runtime gone, thread died) counts as terminated
        if self.state_rx.has_changed().is_err() {
            return ListenerState::Terminated;
        }
        *self.state_rx.borrow()
    }

    /// Tear down the current endpoint; the loop stops without error
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Let the loop run without an owner; only the end of its runtime stops it
    pub fn detach(self) {
        debug!(endpoint = %self.address, "Listener detached from its handle");
        std::mem::forget(self);
    }

    /// Wait until the loop has stopped
    pub async fn terminated(&mut self) {
        let _ = self
            .state_rx
            .wait_for(|s| *s == ListenerState::Terminated)
            .await;
    }
}

/// Leader-side channel listener, configured but not yet running
pub struct Listener {
    address: ChannelAddress,
    callback: Callback,
    dispatcher: Arc<dyn Dispatch>,
    options: ListenerOptions,
}

impl Listener {
    pub fn new(address: ChannelAddress, callback: Callback) -> Self {
        Self {
            address,
            callback,
            dispatcher: Arc::new(DirectDispatch),
            options: ListenerOptions::default(),
        }
    }

    /// Run callbacks on `dispatcher` instead of the listener worker
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatch>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_options(mut self, options: ListenerOptions) -> Self {
        self.options = options;
        self
    }

    /// Start the loop on the current tokio runtime.
    ///
    /// Must be called from within a runtime.
    pub fn spawn(self) -> ListenerHandle {
        let (handle, shutdown_rx, state_tx) = self.handle();
        tokio::spawn(self.run(shutdown_rx, state_tx));
        handle
    }

    /// Start the loop on a dedicated thread with its own current-thread runtime
    pub fn spawn_thread(self) -> Result<ListenerHandle, IpcError> {
        let (handle, shutdown_rx, state_tx) = self.handle();
        std::thread::Builder::new()
            .name("unirun-listener".to_string())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!("Failed to build listener runtime: {}", e);
                        state_tx.send_replace(ListenerState::Terminated);
                        return;
                    }
                };
                rt.block_on(self.run(shutdown_rx, state_tx));
            })?;
        Ok(handle)
    }

    fn handle(
        &self,
    ) -> (
        ListenerHandle,
        broadcast::Receiver<()>,
        watch::Sender<ListenerState>,
    ) {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (state_tx, state_rx) = watch::channel(ListenerState::Listening);
        let handle = ListenerHandle {
            address: self.address.clone(),
            shutdown_tx,
            state_rx,
        };
        (handle, shutdown_rx, state_tx)
    }

    async fn run(
        self,
        mut shutdown_rx: broadcast::Receiver<()>,
        state_tx: watch::Sender<ListenerState>,
    ) {
        let mut rendezvous = match Rendezvous::bind(&self.address) {
            Ok(r) => r,
            Err(e) => {
                error!(endpoint = %self.address, "Listener could not start: {}", e);
                state_tx.send_replace(ListenerState::Terminated);
                return;
            }
        };

        info!(endpoint = %self.address, "Listening for forwarded arguments");

        loop {
            let accepted = tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("Endpoint torn down while waiting for a client");
                    break;
                }
                accepted = rendezvous.accept() => accepted,
            };

            let stream = match accepted {
                Ok(stream) => stream,
                Err(e @ IpcError::ForeignPeer { .. }) => {
                    warn!("{}", e);
                    continue;
                }
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            let read = tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("Endpoint torn down mid-transfer");
                    break;
                }
                read = read_payload(
                    stream,
                    self.options.max_payload_bytes,
                    self.options.read_timeout,
                ) => read,
            };

            match read {
                Ok(payload) => self.deliver(payload),
                Err(e) => warn!("Dropping connection: {}", e),
            }
        }

        drop(rendezvous);
        state_tx.send_replace(ListenerState::Terminated);
        info!(endpoint = %self.address, "Listener stopped");
    }

    fn deliver(&self, payload: Payload) {
        let args = payload.into_args();
        debug!(args = args.len(), "Dispatching forwarded arguments");
        let callback = Arc::clone(&self.callback);
        self.dispatcher.dispatch(Box::new(move || callback(args)));
    }
}
