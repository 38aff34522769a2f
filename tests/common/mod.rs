#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use procvisor::{
    CommandSpec, Config, DelayPolicy, Event, EventKind, RestartLimit, Supervisor, SupervisorBuilder,
};
use tokio::sync::broadcast::{self, error::RecvError};

/// Upper bound for any single wait in these tests.
pub const DEADLINE: Duration = Duration::from_secs(10);

/// Ambient environment for test children (nothing else is inherited).
pub const TEST_PATH: (&str, &str) = ("PATH", "/usr/local/bin:/usr/bin:/bin");

/// Timing tolerance for delay checks.
pub const GRACE: Duration = Duration::from_millis(75);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn sh(script: &str) -> CommandSpec {
    CommandSpec::new("/bin/sh").arg("-c").arg(script)
}

/// Child that runs briefly and then fails.
pub fn crash_app() -> CommandSpec {
    sh("sleep 0.1; exit 1")
}

/// Child that only ends when signalled.
pub fn long_app() -> CommandSpec {
    sh("exec sleep 30")
}

pub fn config(max_restarts: RestartLimit, sleep: DelayPolicy) -> Config {
    Config {
        max_restarts,
        sleep,
        ..Config::default()
    }
}

pub fn builder(spec: CommandSpec) -> SupervisorBuilder {
    init_tracing();
    Supervisor::builder(spec).ambient_env([TEST_PATH])
}

pub fn build(spec: CommandSpec, cfg: Config) -> Arc<Supervisor> {
    builder(spec).config(cfg).build()
}

/// Receives events until `done` returns true for one of them (inclusive).
pub async fn collect_until<F>(rx: &mut broadcast::Receiver<Event>, mut done: F) -> Vec<Event>
where
    F: FnMut(&Event) -> bool,
{
    let mut out = Vec::new();
    let finished = tokio::time::timeout(DEADLINE, async {
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    let last = done(&ev);
                    out.push(ev);
                    if last {
                        return true;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return false,
            }
        }
    })
    .await;
    assert_eq!(
        finished,
        Ok(true),
        "event stream ended early, got {:?}",
        kinds(&out)
    );
    out
}

/// Receives events until the next one of `kind` (inclusive).
pub async fn collect_until_kind(
    rx: &mut broadcast::Receiver<Event>,
    kind: EventKind,
) -> Vec<Event> {
    collect_until(rx, |ev| ev.kind == kind).await
}

/// Lifecycle kinds only (drops relay and diagnostics).
pub fn lifecycle(events: &[Event]) -> Vec<EventKind> {
    events
        .iter()
        .map(|e| e.kind)
        .filter(|k| {
            matches!(
                k,
                EventKind::Spawn
                    | EventKind::Exit
                    | EventKind::Crash
                    | EventKind::Sleep
                    | EventKind::Stop
            )
        })
        .collect()
}

pub fn kinds(events: &[Event]) -> Vec<EventKind> {
    events.iter().map(|e| e.kind).collect()
}

pub fn count(events: &[Event], kind: EventKind) -> usize {
    events.iter().filter(|e| e.kind == kind).count()
}

/// Drains whatever is buffered right now.
pub fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}
