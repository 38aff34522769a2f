//! # Supervisor: the IO shell around the state machine.
//!
//! The [`Supervisor`] owns one [`Machine`], the handle of the current child,
//! the pending restart timer and the event [`Bus`]. It turns machine
//! [`Action`]s into effects (spawn, signal, timers, events) and turns
//! asynchronous occurrences (child output, exits, timer expiry) back into
//! machine [`Input`]s.
//!
//! ## Architecture
//! ```text
//! start()/stop()/stop_with() ──lock──► Machine::handle(Input) ──► [Action, ...]
//!                                                                    │
//!      ┌─────────────── executed in order, still under the lock ─────┘
//!      ├─ Spawn       → runner::launch() → Spawned | SpawnFailed (fed back)
//!      ├─ Signal      → ChildHandle::request_stop()
//!      ├─ ArmTimer    → tokio task: sleep(delay) → Control::TimerFired{generation}
//!      ├─ CancelTimer → abort timer task
//!      └─ Emit        → SubscriberSet::emit + Bus::publish(Event)
//!
//! runner tasks ── Control::Runner{incarnation, report} ──┐
//! timer task ──── Control::TimerFired{generation} ───────┤
//!                                                        ▼
//!                                  control task (one per supervisor)
//!                                  drops stale incarnations/generations,
//!                                  publishes relay events, applies Exited/TimerFired
//! ```
//!
//! ## Rules
//! - Public operations are synchronous and hold the state lock only briefly;
//!   they can be called from anywhere, including from event subscribers and
//!   threads outside the runtime (tasks go to the runtime captured at build).
//! - Events are published under the lock, so `seq` order is transition order.
//! - A respawn only ever happens from the timer, never inline from an exit.
//! - Dropping the last `Arc<Supervisor>` cancels every background task and
//!   kills the child.

use std::collections::{BTreeMap, VecDeque};
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use nix::sys::signal::Signal;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

use crate::command::CommandSpec;
use crate::error::SupervisorError;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::SubscriberSet;

use super::builder::SupervisorBuilder;
use super::child::ChildHandle;
use super::config::Config;
use super::info::SupervisorInfo;
use super::machine::{Action, Input, Machine, Notice, Status};
use super::runner::{self, Launch, Report};

/// Notification delivered to the control task.
#[derive(Debug)]
pub(crate) enum Control {
    /// Something happened to a child incarnation.
    Runner {
        incarnation: u64,
        pid: u32,
        report: Report,
    },
    /// A restart timer expired.
    TimerFired { generation: u64 },
}

struct Timer {
    generation: u64,
    task: AbortHandle,
}

struct Inner {
    machine: Machine,
    child: Option<ChildHandle>,
    timer: Option<Timer>,
    incarnations: u64,
    generations: u64,
}

/// Supervises one child process.
///
/// Created through [`Supervisor::builder`]; always used behind an `Arc`.
pub struct Supervisor {
    spec: CommandSpec,
    cfg: Config,
    name: Option<Arc<str>>,
    env: BTreeMap<OsString, OsString>,
    bus: Bus,
    subscribers: Option<SubscriberSet>,
    runtime: Handle,
    inner: Mutex<Inner>,
    control: mpsc::UnboundedSender<Control>,
    token: CancellationToken,
}

impl Supervisor {
    /// Starts building a supervisor for `spec`.
    pub fn builder(spec: CommandSpec) -> SupervisorBuilder {
        SupervisorBuilder::new(spec)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new_internal(
        spec: CommandSpec,
        cfg: Config,
        env: BTreeMap<OsString, OsString>,
        bus: Bus,
        subscribers: Option<SubscriberSet>,
        runtime: Handle,
        control: mpsc::UnboundedSender<Control>,
        token: CancellationToken,
    ) -> Self {
        let machine = Machine::new(cfg.restart_policy(), cfg.stop_signal);
        Self {
            name: cfg.name.as_deref().map(Arc::from),
            spec,
            cfg,
            env,
            bus,
            subscribers,
            runtime,
            inner: Mutex::new(Inner {
                machine,
                child: None,
                timer: None,
                incarnations: 0,
                generations: 0,
            }),
            control,
            token,
        }
    }

    /// Begins supervision.
    ///
    /// From `stopped` or `crashed` this starts a new episode (restart counter
    /// reset, child spawned). While a stop is in progress the start is deferred
    /// until the child has exited. Otherwise it is a no-op.
    ///
    /// Spawn failures are not returned; they surface as `warn`, `exit` and
    /// `crash` events.
    pub fn start(&self) {
        let mut inner = self.lock();
        self.apply(&mut inner, Input::Start);
    }

    /// Ends supervision with the configured stop signal.
    ///
    /// The status becomes `stopping` before this returns (or `stopped` if a
    /// restart was pending). Safe to call from any state and from subscribers.
    pub fn stop(&self) {
        let mut inner = self.lock();
        self.apply(&mut inner, Input::Stop { signal: None });
    }

    /// Like [`stop`](Self::stop), with an explicit signal.
    ///
    /// While already `stopping`, the signal is forwarded to the child (useful
    /// to escalate to `SIGKILL`).
    pub fn stop_with(&self, signal: Signal) {
        let mut inner = self.lock();
        self.apply(
            &mut inner,
            Input::Stop {
                signal: Some(signal),
            },
        );
    }

    /// Current status.
    pub fn status(&self) -> Status {
        self.lock().machine.status()
    }

    /// Restarts performed in the current episode.
    pub fn restarts(&self) -> u32 {
        self.lock().machine.restart_count()
    }

    /// Handle of the live child, if any.
    pub fn child(&self) -> Option<ChildHandle> {
        self.lock().child.clone()
    }

    /// Configured name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Command this supervisor runs.
    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    /// Sends a structured message to the live child (fork mode only).
    pub fn send(&self, value: &Value) -> Result<(), SupervisorError> {
        let inner = self.lock();
        let child = inner.child.as_ref().ok_or(SupervisorError::NotRunning)?;
        child.send(value)
    }

    /// Subscribes to the event stream (events published after this call).
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Returns a serializable snapshot.
    pub fn info(&self) -> SupervisorInfo {
        let inner = self.lock();
        let child = inner.child.as_ref();
        SupervisorInfo {
            name: self.cfg.name.clone(),
            status: inner.machine.status(),
            pid: child.map(ChildHandle::pid),
            incarnation: child.map(ChildHandle::incarnation),
            started_at: child.map(ChildHandle::started_at),
            restarts: inner.machine.restart_count(),
            max_restarts: self.cfg.max_restarts.as_max_restarts(),
            command: std::iter::once(self.spec.program())
                .chain(self.spec.get_args().iter().map(String::as_str))
                .map(str::to_owned)
                .collect(),
            cwd: self.spec.get_cwd().cloned(),
            env: self.spec.env_overrides().clone(),
            fork: self.spec.is_fork(),
            data: self.cfg.data.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Feeds one input to the machine and executes the resulting actions.
    fn apply(&self, inner: &mut Inner, input: Input) {
        let mut queue: VecDeque<Action> = inner.machine.handle(input).into();
        while let Some(action) = queue.pop_front() {
            match action {
                Action::Spawn => {
                    let outcome = self.spawn_child(inner);
                    for next in inner.machine.handle(outcome).into_iter().rev() {
                        queue.push_front(next);
                    }
                }
                Action::Signal(signal) => self.signal_child(inner, signal),
                Action::ReleaseChild => inner.child = None,
                Action::ArmTimer(delay) => self.arm_timer(inner, delay),
                Action::CancelTimer => {
                    if let Some(timer) = inner.timer.take() {
                        timer.task.abort();
                    }
                }
                Action::Emit(notice) => self.publish(notice),
            }
        }
        debug_assert!(inner.machine.invariants_hold());
    }

    fn spawn_child(&self, inner: &mut Inner) -> Input {
        inner.incarnations += 1;
        let incarnation = inner.incarnations;
        let _rt = self.runtime.enter();
        let launched = runner::launch(Launch {
            spec: &self.spec,
            env: &self.env,
            incarnation,
            kill_timeout: self.cfg.kill_timeout(),
            control: self.control.clone(),
            token: self.token.child_token(),
        });

        match launched {
            Ok(handle) => {
                let pid = handle.pid();
                tracing::debug!(name = ?self.name, pid, incarnation, "child spawned");
                inner.child = Some(handle);
                Input::Spawned { pid }
            }
            Err(e) => {
                tracing::warn!(name = ?self.name, program = self.spec.program(), error = %e, "spawn failed");
                Input::SpawnFailed {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn signal_child(&self, inner: &Inner, signal: Signal) {
        let Some(child) = inner.child.as_ref() else {
            return;
        };
        tracing::debug!(name = ?self.name, pid = child.pid(), %signal, "stopping child");
        if !child.request_stop(signal) {
            // The waiter already saw the exit; its Exited report completes the stop.
            tracing::debug!(pid = child.pid(), "stop raced with exit");
        }
    }

    fn arm_timer(&self, inner: &mut Inner, delay: Duration) {
        inner.generations += 1;
        let generation = inner.generations;
        let control = self.control.clone();
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = control.send(Control::TimerFired { generation });
        });
        if let Some(stale) = inner.timer.replace(Timer {
            generation,
            task: task.abort_handle(),
        }) {
            stale.task.abort();
        }
    }

    fn event(&self, kind: EventKind) -> Event {
        let ev = Event::new(kind);
        match &self.name {
            Some(name) => ev.with_name(Arc::clone(name)),
            None => ev,
        }
    }

    fn publish(&self, notice: Notice) {
        let ev = match notice {
            Notice::Spawn { pid, attempt } => self
                .event(EventKind::Spawn)
                .with_pid(pid)
                .with_attempt(attempt),
            Notice::Exit {
                pid,
                code,
                signal,
                reason,
            } => {
                let mut ev = self.event(EventKind::Exit).with_exit(code, signal);
                ev.pid = pid;
                ev.reason = reason.map(Arc::from);
                ev
            }
            Notice::Crash { restarts } => {
                tracing::info!(name = ?self.name, restarts, "child crashed");
                self.event(EventKind::Crash).with_attempt(restarts)
            }
            Notice::Sleep { attempt, delay } => {
                tracing::debug!(name = ?self.name, attempt, ?delay, "restart scheduled");
                self.event(EventKind::Sleep)
                    .with_attempt(attempt)
                    .with_delay(delay)
            }
            Notice::Stop => self.event(EventKind::Stop),
            Notice::Warn { reason } => self.event(EventKind::Warn).with_reason(reason),
        };
        self.emit(ev);
    }

    /// Hands one event to the subscriber set and the bus.
    fn emit(&self, ev: Event) {
        if let Some(set) = &self.subscribers {
            set.emit(&ev);
        }
        self.bus.publish(ev);
    }

    /// Handles one control notification.
    fn on_control(&self, msg: Control) {
        let mut inner = self.lock();
        match msg {
            Control::TimerFired { generation } => {
                if inner.timer.as_ref().map(|t| t.generation) != Some(generation) {
                    return;
                }
                inner.timer = None;
                self.apply(&mut inner, Input::TimerFired);
            }
            Control::Runner {
                incarnation,
                pid,
                report,
            } => {
                if inner.child.as_ref().map(ChildHandle::incarnation) != Some(incarnation) {
                    tracing::trace!(incarnation, "dropping report from stale incarnation");
                    return;
                }
                match report {
                    Report::Stdout(data) => {
                        self.emit(self.event(EventKind::Stdout).with_pid(pid).with_data(data));
                    }
                    Report::Stderr(data) => {
                        self.emit(self.event(EventKind::Stderr).with_pid(pid).with_data(data));
                    }
                    Report::Message(value) => {
                        self.emit(self.event(EventKind::Message).with_pid(pid).with_message(value));
                    }
                    Report::Warn(reason) => {
                        self.emit(self.event(EventKind::Warn).with_pid(pid).with_reason(reason));
                    }
                    Report::ForceKill => self.emit(self.event(EventKind::ForceKill).with_pid(pid)),
                    Report::Exited { code, signal } => {
                        tracing::debug!(name = ?self.name, pid, ?code, ?signal, "child exited");
                        self.apply(&mut inner, Input::Exited { pid, code, signal });
                    }
                }
            }
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.token.cancel();
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = inner.timer.take() {
            timer.task.abort();
        }
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("name", &self.name)
            .field("program", &self.spec.program())
            .field("status", &self.status())
            .finish()
    }
}

/// Serializes control notifications for one supervisor.
///
/// Holds only a weak reference so the supervisor can be dropped while the
/// loop is idle.
pub(crate) async fn control_loop(
    sup: Weak<Supervisor>,
    mut rx: mpsc::UnboundedReceiver<Control>,
    token: CancellationToken,
) {
    loop {
        let msg = tokio::select! {
            () = token.cancelled() => break,
            msg = rx.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };
        let Some(sup) = sup.upgrade() else {
            break;
        };
        sup.on_control(msg);
    }
}
