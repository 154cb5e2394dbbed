//! The leader-or-forward entry operation

use std::sync::Arc;

use libunirun_core::{ActivatorConfig, Decision, InstanceRole, OsAccount, ScopeIdentity, ScopeNames};
use libunirun_ipc::{
    send_payload, Callback, ChannelAddress, Dispatch, Listener, ListenerOptions, ListenerState,
    Payload,
};
use tracing::{debug, error, info};

use crate::context::InstanceContext;
use crate::error::UnirunError;

/// How a leader's listen loop is hosted
#[derive(Clone, Copy)]
enum Host {
    /// A task on the caller's tokio runtime
    Task,
    /// A dedicated thread with its own runtime
    Thread,
}

/// Decides whether this process is the first instance of its scope.
///
/// The first process to call `launch_or_return` for a scope becomes the leader
/// and (given a callback) starts listening for later launches. Every later
/// process forwards its command-line arguments to the leader and is told to
/// exit. The decision is made once per `Activator`; repeated calls return it
/// without touching the OS again.
///
/// Leadership is for the life of the process: dropping the `Activator` keeps
/// the lock held and leaves a running listener in place. Call
/// `shutdown_listener` to stop receiving forwarded arguments.
pub struct Activator {
    config: ActivatorConfig,
    context: InstanceContext,
    dispatcher: Option<Arc<dyn Dispatch>>,
    forwarded_args: Option<Vec<String>>,
}

impl Default for Activator {
    fn default() -> Self {
        Self::new(ActivatorConfig::default())
    }
}

impl Activator {
    pub fn new(config: ActivatorConfig) -> Self {
        Self::with_account(config, OsAccount::current())
    }

    /// Activator scoped to an explicit OS account instead of the current one
    pub fn with_account(config: ActivatorConfig, account: OsAccount) -> Self {
        Self {
            config,
            context: InstanceContext::new(account),
            dispatcher: None,
            forwarded_args: None,
        }
    }

    /// Run callbacks through `dispatcher` instead of on the listener's thread
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatch>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Forward `args` instead of this process's argument vector
    pub fn with_forwarded_args(mut self, args: Vec<String>) -> Self {
        self.forwarded_args = Some(args);
        self
    }

    pub fn config(&self) -> &ActivatorConfig {
        &self.config
    }

    /// Returns true when this process is the leader and should keep running.
    ///
    /// A leader with a `callback` gets a background listener on the current
    /// tokio runtime that invokes it once per follower launch. A follower sends
    /// its arguments (waiting at most the connect timeout) and gets false; a
    /// failed send is logged, not returned.
    ///
    /// `unique_name` overrides the configured name, which overrides the
    /// executable path hash.
    pub async fn launch_or_return<F>(
        &self,
        callback: Option<F>,
        unique_name: Option<&str>,
    ) -> Result<bool, UnirunError>
    where
        F: Fn(Vec<String>) + Send + Sync + 'static,
    {
        let decision = self.decide(unique_name)?;
        match decision.role {
            InstanceRole::Leader => {
                if let Some(callback) = callback {
                    self.start_listener(&decision, Arc::new(callback), Host::Task);
                }
                Ok(true)
            }
            InstanceRole::Follower => {
                let address = self.address(&decision)?;
                send_payload(&address, &self.payload(), self.config.connect_timeout()).await;
                Ok(false)
            }
        }
    }

    /// `launch_or_return` for callers without a tokio runtime.
    ///
    /// The listener runs on its own thread. Must not be called from inside an
    /// async context.
    pub fn launch_or_return_blocking<F>(
        &self,
        callback: Option<F>,
        unique_name: Option<&str>,
    ) -> Result<bool, UnirunError>
    where
        F: Fn(Vec<String>) + Send + Sync + 'static,
    {
        let decision = self.decide(unique_name)?;
        match decision.role {
            InstanceRole::Leader => {
                if let Some(callback) = callback {
                    self.start_listener(&decision, Arc::new(callback), Host::Thread);
                }
                Ok(true)
            }
            InstanceRole::Follower => {
                let address = self.address(&decision)?;
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| UnirunError::Runtime(e.to_string()))?;
                runtime.block_on(send_payload(
                    &address,
                    &self.payload(),
                    self.config.connect_timeout(),
                ));
                Ok(false)
            }
        }
    }

    /// The decided role, if arbitration has happened
    pub fn role(&self) -> Option<InstanceRole> {
        self.decision().map(|d| d.role)
    }

    /// The identity the role was decided for
    pub fn identity(&self) -> Option<ScopeIdentity> {
        self.decision().map(|d| d.identity)
    }

    pub fn scope_names(&self) -> Option<ScopeNames> {
        self.decision().map(|d| d.names)
    }

    /// Number of OS-level lock claims this activator has made
    pub fn claim_attempts(&self) -> usize {
        self.context
            .existing_arbiter()
            .map(|a| a.claim_attempts())
            .unwrap_or(0)
    }

    /// State of the leader's listener, if one was started
    pub fn listener_state(&self) -> Option<ListenerState> {
        self.context.listener_slot().as_ref().map(|h| h.state())
    }

    /// Stop the leader's listener and remove its endpoint.
    ///
    /// Returns false when no listener was running. The lock stays held, so no
    /// other process becomes leader for this scope while this one lives.
    pub fn shutdown_listener(&self) -> bool {
        match self.context.listener_slot().take() {
            Some(handle) => {
                handle.shutdown();
                info!(endpoint = %handle.address(), "Listener shutdown requested");
                true
            }
            None => false,
        }
    }

    fn decision(&self) -> Option<Decision> {
        self.context.existing_arbiter().and_then(|a| a.decision())
    }

    fn decide(&self, unique_name: Option<&str>) -> Result<Decision, UnirunError> {
        let explicit = unique_name.or(self.config.unique_name.as_deref());
        let identity = self.context.identity(explicit)?;
        let arbiter = self.context.arbiter(self.config.runtime_dir.as_deref())?;
        Ok(arbiter.claim_or_observe(&identity)?)
    }

    fn address(&self, decision: &Decision) -> Result<ChannelAddress, UnirunError> {
        let arbiter = self.context.arbiter(self.config.runtime_dir.as_deref())?;
        Ok(ChannelAddress::new(arbiter.runtime_dir(), &decision.names))
    }

    fn payload(&self) -> Payload {
        match &self.forwarded_args {
            Some(args) => Payload::new(args.clone()),
            None => Payload::from_env(),
        }
    }

    fn start_listener(&self, decision: &Decision, callback: Callback, host: Host) {
        let mut slot = self.context.listener_slot();
        if let Some(handle) = slot.as_ref() {
            if handle.state() == ListenerState::Listening {
                debug!(endpoint = %handle.address(), "Listener already running");
                return;
            }
        }

        let address = match self.address(decision) {
            Ok(address) => address,
            Err(e) => {
                error!("Cannot resolve listener endpoint: {}", e);
                return;
            }
        };
        let options = ListenerOptions {
            read_timeout: self.config.read_timeout(),
            max_payload_bytes: self.config.max_payload_bytes,
        };
        let mut listener = Listener::new(address, callback).with_options(options);
        if let Some(dispatcher) = &self.dispatcher {
            listener = listener.with_dispatcher(Arc::clone(dispatcher));
        }

        let handle = match host {
            Host::Task => listener.spawn(),
            Host::Thread => match listener.spawn_thread() {
                Ok(handle) => handle,
                Err(e) => {
                    error!("Failed to start listener thread: {}", e);
                    return;
                }
            },
        };
        *slot = Some(handle);
    }
}
