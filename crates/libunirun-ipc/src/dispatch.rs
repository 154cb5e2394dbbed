//! Dispatch targets for forwarded arguments
//!
//! The listener captures a dispatch target when it starts. Delivering a payload
//! means handing the callback invocation to that target:
//! - `DirectDispatch` runs it on the listener's own worker
//! - `DispatchQueue` posts it back to whichever thread drives the `DispatchPump`
//! - any `Fn(Job)` closure can bridge to a UI toolkit's own event loop

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, warn};

/// A scheduled callback invocation
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Application callback receiving one follower's arguments
pub type Callback = Arc<dyn Fn(Vec<String>) + Send + Sync + 'static>;

/// Somewhere to run callback invocations
pub trait Dispatch: Send + Sync {
    fn dispatch(&self, job: Job);
}

impl<F> Dispatch for F
where
    F: Fn(Job) + Send + Sync,
{
    fn dispatch(&self, job: Job) {
        self(job)
    }
}

/// Runs the job immediately on the calling (listener) thread
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectDispatch;

impl Dispatch for DirectDispatch {
    fn dispatch(&self, job: Job) {
        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!("Forwarded-arguments callback panicked");
        }
    }
}

/// Create a queue and the pump that drains it
pub fn dispatch_queue() -> (DispatchQueue, DispatchPump) {
    let (tx, rx) = mpsc::unbounded_channel();
    (DispatchQueue { tx }, DispatchPump { rx })
}

/// Posting side, handed to the listener
#[derive(Debug, Clone)]
pub struct DispatchQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl Dispatch for DispatchQueue {
    fn dispatch(&self, job: Job) {
        if self.tx.send(job).is_err() {
            warn!("Dispatch pump dropped; forwarded arguments discarded");
        }
    }
}

/// Draining side, owned by the thread that should run callbacks
#[derive(Debug)]
pub struct DispatchPump {
    rx: mpsc::UnboundedReceiver<Job>,
}

impl DispatchPump {
    /// Run everything queued so far without waiting; returns how many ran
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Wait for and run one job; `false` once every queue handle is gone
    pub async fn run_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Blocking form of `run_next`, for threads outside any async runtime
    pub fn blocking_run_next(&mut self) -> bool {
        match self.rx.blocking_recv() {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run jobs until every queue handle is gone
    pub async fn run(mut self) {
        while self.run_next().await {}
    }
}
