//! # Supervision state machine (pure).
//!
//! [`Machine`] owns the lifecycle rules and nothing else: it receives an
//! [`Input`], updates its status and counters, and returns the ordered list of
//! [`Action`]s the IO shell must carry out. It never spawns, sleeps or signals
//! itself, so the whole transition table is testable without processes.
//!
//! ## Transition table
//! ```text
//! From              Input                      To         Actions
//! ───────────────── ────────────────────────── ────────── ─────────────────────────────────────────────
//! stopped/crashed   Start                      (spawn)    reset counters, Spawn
//! running/crashing  Start                      unchanged  -
//! stopping          Start                      stopping   remember a deferred start
//! (any, spawning)   Spawned{pid}               running    Emit(spawn)
//! (any, spawning)   SpawnFailed                see Exited Emit(warn) + unexpected-exit handling
//! running           Exited, stop requested     stopped    Release, Emit(exit), Emit(stop)
//! running           Exited, budget left        crashing   Release, Emit(exit), Emit(crash),
//!                                                         count += 1, ArmTimer(delay), Emit(sleep)
//! running           Exited, budget exhausted   crashed    Release, Emit(exit), Emit(crash), Emit(stop)
//! stopping          Exited                     stopped    Release, Emit(exit), Emit(stop) [+ deferred Start]
//! crashing          TimerFired                 (spawn)    Spawn
//! running           Stop                       stopping   Signal(stop signal)
//! stopping          Stop(explicit signal)      stopping   Signal(signal)
//! crashing          Stop                       stopped    CancelTimer, Emit(stop)
//! stopped/crashed   Stop                       unchanged  -
//! ```
//!
//! ## Invariants
//! - at most one child and one pending timer;
//! - `running` ⇒ child present, no timer;
//! - `crashing` ⇒ no child, timer armed;
//! - `stopped`/`crashed` ⇒ neither;
//! - `restart_count` resets only on a start from a terminal status.

use std::fmt;
use std::time::Duration;

use nix::sys::signal::Signal;
use serde::{Deserialize, Serialize};

use crate::policies::RestartPolicy;

/// Supervisor status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// No child, no pending restart. Initial status.
    Stopped,
    /// A child is alive.
    Running,
    /// `stop()` was requested and the child has not exited yet.
    Stopping,
    /// The child crashed and a restart is scheduled.
    Crashing,
    /// The child crashed and the restart budget is exhausted.
    Crashed,
}

impl Status {
    /// Returns the lowercase status name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Stopped => "stopped",
            Status::Running => "running",
            Status::Stopping => "stopping",
            Status::Crashing => "crashing",
            Status::Crashed => "crashed",
        }
    }

    /// Returns `true` for `stopped` and `crashed`.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Stopped | Status::Crashed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that happened to the supervisor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Input {
    /// Caller invoked `start()`.
    Start,
    /// Caller invoked `stop()` (`None` = configured stop signal).
    Stop { signal: Option<Signal> },
    /// The shell spawned the child.
    Spawned { pid: u32 },
    /// The shell failed to spawn the child.
    SpawnFailed { reason: String },
    /// The current child terminated.
    Exited {
        pid: u32,
        code: Option<i32>,
        signal: Option<i32>,
    },
    /// The pending restart timer fired.
    TimerFired,
}

/// Lifecycle notification to publish.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Notice {
    Spawn {
        pid: u32,
        attempt: u32,
    },
    Exit {
        pid: Option<u32>,
        code: Option<i32>,
        signal: Option<i32>,
        reason: Option<String>,
    },
    Crash {
        restarts: u32,
    },
    Sleep {
        attempt: u32,
        delay: Duration,
    },
    Stop,
    Warn {
        reason: String,
    },
}

/// Work for the IO shell, in execution order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Action {
    /// Spawn a child; feed back `Spawned` or `SpawnFailed`.
    Spawn,
    /// Deliver a signal to the current child.
    Signal(Signal),
    /// Drop the handle of the exited child (tears down its relay).
    ReleaseChild,
    /// Arm the restart timer; feed back `TimerFired`.
    ArmTimer(Duration),
    /// Cancel the pending restart timer.
    CancelTimer,
    /// Publish a notification.
    Emit(Notice),
}

/// Pure supervision state.
#[derive(Debug)]
pub(crate) struct Machine {
    policy: RestartPolicy,
    stop_signal: Signal,

    status: Status,
    restart_count: u32,
    stop_requested: bool,
    has_child: bool,
    has_timer: bool,
    start_after_stop: bool,
}

impl Machine {
    /// Creates a machine in the `stopped` status.
    pub(crate) fn new(policy: RestartPolicy, stop_signal: Signal) -> Self {
        Self {
            policy,
            stop_signal,
            status: Status::Stopped,
            restart_count: 0,
            stop_requested: false,
            has_child: false,
            has_timer: false,
            start_after_stop: false,
        }
    }

    pub(crate) fn status(&self) -> Status {
        self.status
    }

    pub(crate) fn restart_count(&self) -> u32 {
        self.restart_count
    }

    /// Applies one input and returns the actions to perform.
    pub(crate) fn handle(&mut self, input: Input) -> Vec<Action> {
        match input {
            Input::Start => self.on_start(),
            Input::Stop { signal } => self.on_stop(signal),
            Input::Spawned { pid } => self.on_spawned(pid),
            Input::SpawnFailed { reason } => self.on_spawn_failed(reason),
            Input::Exited { pid, code, signal } => self.on_exited(pid, code, signal),
            Input::TimerFired => self.on_timer(),
        }
    }

    fn on_start(&mut self) -> Vec<Action> {
        match self.status {
            Status::Stopped | Status::Crashed => {
                self.restart_count = 0;
                self.stop_requested = false;
                vec![Action::Spawn]
            }
            Status::Stopping => {
                self.start_after_stop = true;
                Vec::new()
            }
            Status::Running | Status::Crashing => Vec::new(),
        }
    }

    fn on_stop(&mut self, signal: Option<Signal>) -> Vec<Action> {
        match self.status {
            Status::Running => {
                self.stop_requested = true;
                self.status = Status::Stopping;
                vec![Action::Signal(signal.unwrap_or(self.stop_signal))]
            }
            Status::Stopping => {
                self.start_after_stop = false;
                signal.map(Action::Signal).into_iter().collect()
            }
            Status::Crashing => {
                self.has_timer = false;
                self.status = Status::Stopped;
                vec![Action::CancelTimer, Action::Emit(Notice::Stop)]
            }
            Status::Stopped | Status::Crashed => Vec::new(),
        }
    }

    fn on_spawned(&mut self, pid: u32) -> Vec<Action> {
        self.has_child = true;
        self.has_timer = false;
        self.status = Status::Running;
        vec![Action::Emit(Notice::Spawn {
            pid,
            attempt: self.restart_count,
        })]
    }

    fn on_spawn_failed(&mut self, reason: String) -> Vec<Action> {
        let mut actions = vec![
            Action::Emit(Notice::Warn {
                reason: reason.clone(),
            }),
            Action::Emit(Notice::Exit {
                pid: None,
                code: None,
                signal: None,
                reason: Some(reason),
            }),
        ];
        actions.extend(self.after_unexpected_exit());
        actions
    }

    fn on_exited(&mut self, pid: u32, code: Option<i32>, signal: Option<i32>) -> Vec<Action> {
        if !self.has_child {
            return Vec::new();
        }
        self.has_child = false;

        let mut actions = vec![
            Action::ReleaseChild,
            Action::Emit(Notice::Exit {
                pid: Some(pid),
                code,
                signal,
                reason: None,
            }),
        ];

        if self.stop_requested {
            self.status = Status::Stopped;
            actions.push(Action::Emit(Notice::Stop));
            if std::mem::take(&mut self.start_after_stop) {
                actions.extend(self.on_start());
            }
        } else {
            actions.extend(self.after_unexpected_exit());
        }
        actions
    }

    /// Crash handling shared by real exits and spawn failures.
    fn after_unexpected_exit(&mut self) -> Vec<Action> {
        let mut actions = vec![Action::Emit(Notice::Crash {
            restarts: self.restart_count,
        })];

        if self.policy.limit.allows(self.restart_count) {
            self.restart_count = self.restart_count.saturating_add(1);
            let delay = self.policy.delay.delay_for(self.restart_count);
            self.status = Status::Crashing;
            self.has_timer = true;
            actions.push(Action::ArmTimer(delay));
            actions.push(Action::Emit(Notice::Sleep {
                attempt: self.restart_count,
                delay,
            }));
        } else {
            self.status = Status::Crashed;
            actions.push(Action::Emit(Notice::Stop));
        }
        actions
    }

    fn on_timer(&mut self) -> Vec<Action> {
        if self.status != Status::Crashing || !self.has_timer {
            return Vec::new();
        }
        self.has_timer = false;
        vec![Action::Spawn]
    }

    /// Checks the structural invariants (used by tests and debug assertions).
    pub(crate) fn invariants_hold(&self) -> bool {
        match self.status {
            Status::Running => self.has_child && !self.has_timer,
            Status::Stopping => self.has_child && !self.has_timer,
            Status::Crashing => !self.has_child && self.has_timer,
            Status::Stopped | Status::Crashed => !self.has_child && !self.has_timer,
        }
    }
}
