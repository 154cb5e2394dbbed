//! Instance arbitration
//!
//! The first process to take an exclusive, non-blocking lock on the scope's lock
//! file becomes the leader and keeps the lock until it exits, whatever happens
//! to the `Arbiter` that took it. Everyone else is a follower. The decision is
//! made once per `Arbiter` and memoized.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use fs2::FileExt;
use tracing::{debug, info};

use crate::error::CoreError;
use crate::identity::ScopeIdentity;
use crate::paths;
use crate::scope::{OsAccount, ScopeNames};

/// Outcome of arbitration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceRole {
    /// Won the lock; keeps starting up and owns the listener
    Leader,
    /// Lost the lock; forwards its arguments and exits
    Follower,
}

impl InstanceRole {
    pub fn is_leader(self) -> bool {
        matches!(self, InstanceRole::Leader)
    }
}

/// An exclusive lock on a scope's lock file.
///
/// There is no release method. Dropping the value unlocks the file;
/// `hold_until_exit` keeps it locked until the process ends.
#[derive(Debug)]
pub struct InstanceLock {
    _file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Try to take the lock without blocking.
    ///
    /// Returns `Ok(None)` when another holder already owns it.
    pub fn try_claim(path: &Path) -> Result<Option<Self>, CoreError> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| CoreError::LockCreate {
                path: path.to_path_buf(),
                source,
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if is_contended(&e) => return Ok(None),
            Err(source) => {
                return Err(CoreError::LockCreate {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }

        // Holder pid, for administrators only
        if let Err(e) = file
            .set_len(0)
            .and_then(|_| writeln!(file, "{}", std::process::id()))
        {
            debug!(path = %path.display(), "Could not record holder pid: {}", e);
        }

        Ok(Some(Self {
            _file: file,
            path: path.to_path_buf(),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the file open, and so locked, until the process exits
    pub fn hold_until_exit(self) {
        debug!(path = %self.path.display(), "Holding instance lock until exit");
        std::mem::forget(self);
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// A memoized arbitration result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub role: InstanceRole,
    pub identity: ScopeIdentity,
    pub names: ScopeNames,
}


/// Decides leader or follower once and remembers the answer
pub struct Arbiter {
    runtime_dir: PathBuf,
    account: OsAccount,
    state: Mutex<Option<Decision>>,
    attempts: AtomicUsize,
}

impl Arbiter {
    /// Arbiter for the current OS account, keeping lock files in `runtime_dir`
    pub fn new(runtime_dir: PathBuf) -> Self {
        Self::with_account(runtime_dir, OsAccount::current())
    }

    pub fn with_account(runtime_dir: PathBuf, account: OsAccount) -> Self {
        Self {
            runtime_dir,
            account,
            state: Mutex::new(None),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn account(&self) -> &OsAccount {
        &self.account
    }

    pub fn runtime_dir(&self) -> &Path {
        &self.runtime_dir
    }

    /// Claim leadership for `identity`, or return the earlier decision.
    ///
    /// A won lock is held until the process exits, even if this arbiter is
    /// dropped. Only the first successful call touches the OS lock. Later calls
    /// return that first decision even when `identity` differs. A failed claim
    /// is not memoized.
    pub fn claim_or_observe(&self, identity: &ScopeIdentity) -> Result<Decision, CoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(decided) = state.as_ref() {
            if &decided.identity != identity {
                debug!(
                    decided = %decided.identity,
                    requested = %identity,
                    "Role already decided for another identity"
                );
            }
            return Ok(decided.clone());
        }

        let names = ScopeNames::new(&self.account, identity);
        let path = paths::lock_path(&self.runtime_dir, &names);
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let lock = InstanceLock::try_claim(&path)?;

        let role = match lock {
            Some(lock) => {
                lock.hold_until_exit();
                InstanceRole::Leader
            }
            None => InstanceRole::Follower,
        };
        info!(
            role = ?role,
            lock = %names.lock_name,
            path = %path.display(),
            "Instance role decided"
        );

        let decision = Decision {
            role,
            identity: identity.clone(),
            names,
        };
        *state = Some(decision.clone());
        Ok(decision)
    }

    /// The memoized decision, if one was made
    pub fn decision(&self) -> Option<Decision> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of OS-level lock claims performed
    pub fn claim_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}
