//! Job control for pause/resume/abort.
//!
//! Each running job gets a [`JobHandle`] (the sending side, cheap to clone)
//! and a [`ControlSignal`] (held by the orchestrator loop). A registry,
//! [`JobControl`], maps job titles to handles so a control client (e.g.
//! `ndl pause <title>` via socket) can reach a job it did not start.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use sha2::{Digest, Sha256};
use tokio::sync::watch;

/// Requested run state, last writer wins except that `Abort` is sticky.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Run,
    Pause,
    Abort,
}

/// Error returned when a job is stopped by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("job aborted by user")]
pub struct JobAborted;

/// Sending side: pause, resume or abort one job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    tx: Arc<watch::Sender<Command>>,
}

impl JobHandle {
    pub fn pause(&self) {
        self.send(Command::Pause);
    }

    pub fn resume(&self) {
        self.send(Command::Run);
    }

    pub fn abort(&self) {
        self.tx.send_replace(Command::Abort);
    }

    pub fn current(&self) -> Command {
        *self.tx.borrow()
    }

    fn send(&self, cmd: Command) {
        self.tx.send_if_modified(|cur| {
            if *cur == Command::Abort || *cur == cmd {
                return false;
            }
            *cur = cmd;
            true
        });
    }
}

/// Receiving side, owned by the orchestrator.
#[derive(Debug, Clone)]
pub struct ControlSignal {
    rx: watch::Receiver<Command>,
}

impl ControlSignal {
    pub fn current(&self) -> Command {
        *self.rx.borrow()
    }

    pub fn is_paused(&self) -> bool {
        self.current() == Command::Pause
    }

    pub fn is_aborted(&self) -> bool {
        self.current() == Command::Abort
    }

    /// Resolves once the job is aborted. Never resolves if every handle is
    /// dropped without aborting.
    pub async fn aborted(&mut self) {
        if self.rx.wait_for(|c| *c == Command::Abort).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Resolves on the next command change (or never, if all handles are gone).
    pub async fn changed(&mut self) -> Command {
        if self.rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
        self.current()
    }

    /// While paused, wait until resumed or aborted. Returns `Err(JobAborted)` on abort.
    pub async fn wait_while_paused(&mut self) -> Result<(), JobAborted> {
        let res = self.rx.wait_for(|c| *c != Command::Pause).await;
        match res.map(|c| *c) {
            Ok(Command::Abort) => Err(JobAborted),
            Ok(_) => Ok(()),
            // All handles dropped while paused: nobody can resume us.
            Err(_) => Err(JobAborted),
        }
    }
}

/// New connected handle/signal pair in the `Run` state.
pub fn channel() -> (JobHandle, ControlSignal) {
    let (tx, rx) = watch::channel(Command::Run);
    (JobHandle { tx: Arc::new(tx) }, ControlSignal { rx })
}

/// Shared registry of job title -> control handle. Used by the CLI runner to
/// register its job and by the control socket to deliver pause/resume/abort.
#[derive(Default)]
pub struct JobControl {
    jobs: RwLock<HashMap<String, JobHandle>>,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a running job; returns the signal to pass to the orchestrator.
    pub fn register(&self, title: &str) -> (JobHandle, ControlSignal) {
        let (handle, signal) = channel();
        if let Ok(mut jobs) = self.jobs.write() {
            jobs.insert(title.to_string(), handle.clone());
        }
        (handle, signal)
    }

    /// Unregister a job (call when the job finishes, success or failure).
    pub fn unregister(&self, title: &str) {
        if let Ok(mut jobs) = self.jobs.write() {
            jobs.remove(title);
        }
    }

    fn with_handle(&self, title: &str, f: impl FnOnce(&JobHandle)) -> bool {
        match self.jobs.read() {
            Ok(jobs) => match jobs.get(title) {
                Some(h) => {
                    f(h);
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    /// Returns false if no job with this title is registered.
    pub fn request_pause(&self, title: &str) -> bool {
        self.with_handle(title, JobHandle::pause)
    }

    pub fn request_resume(&self, title: &str) -> bool {
        self.with_handle(title, JobHandle::resume)
    }

    pub fn request_abort(&self, title: &str) -> bool {
        self.with_handle(title, JobHandle::abort)
    }
}

/// Socket file name for a job. Derived from the checkpoint key, so titles that
/// share a checkpoint also share a socket; hashed to stay under `sun_path`'s limit.
pub fn control_socket_name(title: &str) -> String {
    let digest = Sha256::digest(crate::naming::checkpoint_key(title).as_bytes());
    format!("{}.sock", hex::encode(&digest[..8]))
}

/// Per-job control socket under `<state dir>/control/`.
pub fn control_socket_path(title: &str) -> anyhow::Result<PathBuf> {
    Ok(crate::config::state_dir()?
        .join("control")
        .join(control_socket_name(title)))
}
