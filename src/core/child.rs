//! # Handle to the current child incarnation.
//!
//! [`ChildHandle`] is a read-only view of the live child plus two narrow
//! control paths:
//! - signal requests, routed to the incarnation's waiter task. The waiter owns
//!   the process and stops accepting requests once it has reaped it, so a
//!   handle that outlives its incarnation never signals a recycled pid;
//! - outgoing structured messages, queued to the channel writer (fork mode).
//!
//! Callers get clones through [`Supervisor::child`](crate::Supervisor::child).
//! A signal sent with [`ChildHandle::signal`] bypasses the supervisor: if it
//! terminates the child, the exit counts as a crash.

use chrono::{DateTime, Utc};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::command::channel::encode_line;
use crate::error::SupervisorError;

/// Live child process reference.
#[derive(Clone, Debug)]
pub struct ChildHandle {
    pid: u32,
    incarnation: u64,
    started_at: DateTime<Utc>,
    requests: mpsc::UnboundedSender<Request>,
    outbox: Option<mpsc::UnboundedSender<Vec<u8>>>,
}

/// Signal request for the waiter of one incarnation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Request {
    /// Supervisor stop: deliver and arm `SIGKILL` escalation.
    Stop(Signal),
    /// Caller signal: deliver only.
    Signal(Signal),
}

impl ChildHandle {
    pub(crate) fn new(
        pid: u32,
        incarnation: u64,
        requests: mpsc::UnboundedSender<Request>,
        outbox: Option<mpsc::UnboundedSender<Vec<u8>>>,
    ) -> Self {
        Self {
            pid,
            incarnation,
            started_at: Utc::now(),
            requests,
            outbox,
        }
    }

    /// OS process id.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Supervisor-local incarnation number (increments on every spawn).
    pub fn incarnation(&self) -> u64 {
        self.incarnation
    }

    /// Spawn timestamp.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns `true` if the child was started with the structured channel.
    pub fn has_channel(&self) -> bool {
        self.outbox.is_some()
    }

    /// Sends `signal` to the child.
    ///
    /// The supervisor does not know about it, so a resulting exit is handled as
    /// a crash. Fails with [`SupervisorError::NotRunning`] once this
    /// incarnation has exited; delivery errors surface as `warn` events.
    pub fn signal(&self, signal: Signal) -> Result<(), SupervisorError> {
        self.requests
            .send(Request::Signal(signal))
            .map_err(|_| SupervisorError::NotRunning)
    }

    /// Asks the waiter task to deliver a stop signal.
    ///
    /// Returns `false` if the incarnation already finished.
    pub(crate) fn request_stop(&self, signal: Signal) -> bool {
        self.requests.send(Request::Stop(signal)).is_ok()
    }

    /// Queues one structured message for the child.
    pub(crate) fn send(&self, value: &Value) -> Result<(), SupervisorError> {
        let outbox = self.outbox.as_ref().ok_or(SupervisorError::NoChannel)?;
        let line = encode_line(value)?;
        outbox.send(line).map_err(|_| SupervisorError::NotRunning)
    }
}

/// Delivers `signal` to `pid`.
pub(crate) fn deliver(pid: u32, signal: Signal) -> Result<(), SupervisorError> {
    let raw = i32::try_from(pid).map_err(|_| SupervisorError::Signal {
        pid,
        source: nix::Error::EINVAL,
    })?;
    kill(Pid::from_raw(raw), signal).map_err(|source| SupervisorError::Signal { pid, source })
}
