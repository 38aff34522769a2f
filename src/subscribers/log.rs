//! # LogWriter: lifecycle events as `tracing` records.
//!
//! A minimal subscriber for demos and debugging. Lifecycle events become
//! `info`/`warn` records; stdout/stderr chunks are logged at `debug` level as
//! lossy UTF-8 so a binary child cannot break the log line.
//!
//! ## Example output (with `tracing_subscriber::fmt`)
//! ```text
//! INFO procvisor: spawn name="worker" pid=4242 attempt=0
//! INFO procvisor: exit name="worker" pid=4242 code=1
//! WARN procvisor: crash name="worker" restarts=0
//! INFO procvisor: sleep name="worker" attempt=1 delay_ms=1000
//! INFO procvisor: stop name="worker"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let name = e.name.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::Spawn => {
                tracing::info!(target: "procvisor", name, pid = e.pid, attempt = e.attempt, "spawn");
            }
            EventKind::Exit => {
                tracing::info!(
                    target: "procvisor",
                    name,
                    pid = e.pid,
                    code = e.code,
                    signal = e.signal,
                    reason = e.reason.as_deref(),
                    "exit"
                );
            }
            EventKind::Crash => {
                tracing::warn!(target: "procvisor", name, restarts = e.attempt, "crash");
            }
            EventKind::Sleep => {
                tracing::info!(target: "procvisor", name, attempt = e.attempt, delay_ms = e.delay_ms, "sleep");
            }
            EventKind::Stop => {
                tracing::info!(target: "procvisor", name, "stop");
            }
            EventKind::Stdout | EventKind::Stderr => {
                if let Some(data) = &e.data {
                    tracing::debug!(
                        target: "procvisor",
                        name,
                        stream = e.kind.as_label(),
                        text = %String::from_utf8_lossy(data),
                        "output"
                    );
                }
            }
            EventKind::Message => {
                tracing::info!(target: "procvisor", name, message = ?e.message, "message");
            }
            EventKind::Warn => {
                tracing::warn!(target: "procvisor", name, reason = e.reason.as_deref(), "warn");
            }
            EventKind::ForceKill => {
                tracing::warn!(target: "procvisor", name, pid = e.pid, "force-kill");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
