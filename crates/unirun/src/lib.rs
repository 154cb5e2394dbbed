//! Single-instance launching for desktop and command-line programs
//!
//! The first process launched for a scope (an executable, or an explicit name,
//! per OS user) becomes the leader. Later launches forward their command-line
//! arguments to it and exit.
//!
//! ```no_run
//! # async fn run() -> Result<(), unirun::UnirunError> {
//! let activator = unirun::Activator::default();
//! let is_leader = activator
//!     .launch_or_return(Some(|args: Vec<String>| println!("{:?}", args)), None)
//!     .await?;
//! if !is_leader {
//!     std::process::exit(0);
//! }
//! # Ok(())
//! # }
//! ```

pub mod activator;
pub mod context;
pub mod error;

pub use activator::Activator;
pub use context::InstanceContext;
pub use error::UnirunError;

pub use libunirun_core::{ActivatorConfig, InstanceRole, OsAccount, ScopeIdentity, ScopeNames};
pub use libunirun_ipc::{dispatch_queue, DirectDispatch, Dispatch, DispatchPump, DispatchQueue, ListenerState};
