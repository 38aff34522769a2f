//! # Lifecycle notifications emitted by the supervisor.
//!
//! The [`EventKind`] enum classifies notifications in three groups:
//! - **Lifecycle**: `Spawn`, `Exit`, `Crash`, `Sleep`, `Stop`
//! - **Relay**: `Stdout`, `Stderr`, `Message` (child output, forwarded verbatim)
//! - **Diagnostics**: `Warn`, `ForceKill`
//!
//! The [`Event`] struct carries the payload fields relevant to its kind.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. For one supervisor, events are published in the order the
//! underlying occurrences were processed, so `seq` order equals delivery order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use procvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::Sleep)
//!     .with_name("worker")
//!     .with_attempt(3)
//!     .with_delay(Duration::from_millis(450));
//!
//! assert_eq!(ev.kind, EventKind::Sleep);
//! assert_eq!(ev.attempt, Some(3));
//! assert_eq!(ev.delay_ms, Some(450));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use serde_json::Value;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of supervisor notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Lifecycle ===
    /// Child (re)started.
    ///
    /// Sets:
    /// - `pid`: OS process id
    /// - `attempt`: 0 for the initial spawn of an episode, `n` for the n-th restart
    Spawn,

    /// Child process terminated.
    ///
    /// Sets:
    /// - `pid`: process id of the exited child (absent for spawn failures)
    /// - `code`: exit code, if the child exited normally
    /// - `signal`: terminating signal number, if killed by a signal
    /// - `reason`: spawn error, when the child never started
    Exit,

    /// The exit was unexpected (not caused by `stop()`).
    ///
    /// Sets:
    /// - `attempt`: restarts performed so far in this episode
    Crash,

    /// A restart has been scheduled. Published when the timer is armed.
    ///
    /// Sets:
    /// - `attempt`: the restart attempt this timer leads to (1-based)
    /// - `delay_ms`: delay before the spawn
    Sleep,

    /// The episode reached a terminal status (`stopped` or `crashed`).
    ///
    /// Always the last event of an episode.
    Stop,

    // === Relay ===
    /// Raw chunk read from the child's standard output.
    ///
    /// Sets:
    /// - `pid`, `data`
    Stdout,

    /// Raw chunk read from the child's standard error.
    ///
    /// Sets:
    /// - `pid`, `data`
    Stderr,

    /// Structured message received over the fork-mode channel.
    ///
    /// Sets:
    /// - `pid`, `message`
    Message,

    // === Diagnostics ===
    /// Something went wrong without changing the lifecycle on its own
    /// (spawn error details, malformed channel line, signal delivery failure).
    ///
    /// Sets:
    /// - `reason`
    Warn,

    /// A stopping child ignored its stop signal past `kill_timeout` and was sent `SIGKILL`.
    ///
    /// Sets:
    /// - `pid`
    ForceKill,
}

impl EventKind {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::Spawn => "spawn",
            EventKind::Exit => "exit",
            EventKind::Crash => "crash",
            EventKind::Sleep => "sleep",
            EventKind::Stop => "stop",
            EventKind::Stdout => "stdout",
            EventKind::Stderr => "stderr",
            EventKind::Message => "message",
            EventKind::Warn => "warn",
            EventKind::ForceKill => "force_kill",
        }
    }
}

/// Supervisor notification with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Supervisor name, if one was configured.
    pub name: Option<Arc<str>>,
    /// Child process id.
    pub pid: Option<u32>,
    /// Attempt number (see [`EventKind`] for its meaning per kind).
    pub attempt: Option<u32>,
    /// Restart delay in milliseconds (compact).
    pub delay_ms: Option<u64>,
    /// Exit code.
    pub code: Option<i32>,
    /// Terminating signal number.
    pub signal: Option<i32>,
    /// Raw output chunk.
    pub data: Option<Bytes>,
    /// Structured message.
    pub message: Option<Arc<Value>>,
    /// Human-readable reason (errors, warnings).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            name: None,
            pid: None,
            attempt: None,
            delay_ms: None,
            code: None,
            signal: None,
            data: None,
            message: None,
            reason: None,
        }
    }

    /// Attaches the supervisor name.
    #[inline]
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attaches a process id.
    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches an attempt number.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a restart delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    /// Attaches the exit status.
    #[inline]
    pub fn with_exit(mut self, code: Option<i32>, signal: Option<i32>) -> Self {
        self.code = code;
        self.signal = signal;
        self
    }

    /// Attaches an output chunk.
    #[inline]
    pub fn with_data(mut self, data: Bytes) -> Self {
        self.data = Some(data);
        self
    }

    /// Attaches a structured message.
    #[inline]
    pub fn with_message(mut self, message: Value) -> Self {
        self.message = Some(Arc::new(message));
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Returns the restart delay as a [`Duration`], if set.
    #[inline]
    pub fn delay(&self) -> Option<Duration> {
        self.delay_ms.map(Duration::from_millis)
    }

    /// Returns `true` for the events that end an episode.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, EventKind::Stop)
    }
}
