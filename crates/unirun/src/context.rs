//! Process-scoped state for one activator
//!
//! Holds the memoized default identity, the arbiter and the single listener
//! slot. Constructed once and owned by the `Activator`; nothing here is global.
//! A leader's lock is held until the process exits, and a running listener is
//! detached rather than stopped when the context is dropped.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, OnceLock};

use libunirun_core::{paths, Arbiter, CoreError, OsAccount, ScopeIdentity};
use libunirun_ipc::{ListenerHandle, ListenerState};

pub struct InstanceContext {
    account: OsAccount,
    default_identity: OnceLock<ScopeIdentity>,
    arbiter: OnceLock<Arbiter>,
    listener: Mutex<Option<ListenerHandle>>,
}

impl InstanceContext {
    pub fn new(account: OsAccount) -> Self {
        Self {
            account,
            default_identity: OnceLock::new(),
            arbiter: OnceLock::new(),
            listener: Mutex::new(None),
        }
    }

    pub fn account(&self) -> &OsAccount {
        &self.account
    }

    /// The explicit name when given, else the executable hash computed once
    pub fn identity(&self, explicit: Option<&str>) -> Result<ScopeIdentity, CoreError> {
        if let Some(name) = explicit {
            return ScopeIdentity::explicit(name);
        }
        if let Some(identity) = self.default_identity.get() {
            return Ok(identity.clone());
        }
        let derived = ScopeIdentity::from_current_executable()?;
        Ok(self.default_identity.get_or_init(|| derived).clone())
    }

    /// The arbiter, preparing the runtime directory on first use
    pub fn arbiter(&self, runtime_dir: Option<&Path>) -> Result<&Arbiter, CoreError> {
        if let Some(arbiter) = self.arbiter.get() {
            return Ok(arbiter);
        }
        let dir = paths::runtime_dir(runtime_dir)?;
        Ok(self
            .arbiter
            .get_or_init(|| Arbiter::with_account(dir, self.account.clone())))
    }

    /// The arbiter, if one was created
    pub fn existing_arbiter(&self) -> Option<&Arbiter> {
        self.arbiter.get()
    }

    pub fn listener_slot(&self) -> MutexGuard<'_, Option<ListenerHandle>> {
        self.listener.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for InstanceContext {
    fn drop(&mut self) {
        let slot = self.listener.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = slot.take() {
            if handle.state() == ListenerState::Listening {
                handle.detach();
            }
        }
    }
}
