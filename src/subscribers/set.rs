//! # Non-blocking, lossless event fan-out to multiple subscribers.
//!
//! [`SubscriberSet`] distributes each [`Event`](crate::events::Event) to every
//! subscriber **without awaiting** their processing.
//!
//! ## Guarantees
//! - `emit(&Event)` returns immediately.
//! - Per-subscriber FIFO: each subscriber sees events in `seq` order.
//! - Nothing is dropped: a slow subscriber only grows its own queue. Crossing
//!   [`Subscribe::queue_capacity`] logs a backlog warning once per episode of
//!   congestion.
//! - Panics inside subscribers are caught and logged; the worker keeps going.
//!
//! ## Non-guarantees
//! - No ordering across different subscribers.
//!
//! ```text
//!    emit(&Event)
//!        │                        (Arc-clone per subscriber)
//!        ├────────────────► [queue S1] ─► worker S1 ─► on_event()
//!        ├────────────────► [queue S2] ─► worker S2 ─► on_event()
//!        └────────────────► [queue SN] ─► worker SN ─► on_event()
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use futures::FutureExt;
use tokio::{runtime::Handle, sync::mpsc, task::JoinHandle};

use crate::events::Event;

use super::Subscribe;

/// Queue depth shared between `emit` and the worker.
#[derive(Default)]
struct Backlog {
    depth: AtomicUsize,
    congested: AtomicBool,
}

struct SubscriberChannel {
    name: &'static str,
    warn_at: usize,
    backlog: Arc<Backlog>,
    sender: mpsc::UnboundedSender<Arc<Event>>,
}

/// Composite fan-out with per-subscriber queues and worker tasks.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    workers: Vec<JoinHandle<()>>,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker per subscriber.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        Self::on(&Handle::current(), subs)
    }

    /// Like [`new`](Self::new), spawning the workers on `runtime`.
    #[must_use]
    pub fn on(runtime: &Handle, subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let name = sub.name();
            let warn_at = sub.queue_capacity().max(1);
            let backlog = Arc::new(Backlog::default());
            let (tx, mut rx) = mpsc::unbounded_channel::<Arc<Event>>();

            let seen = Arc::clone(&backlog);
            let handle = runtime.spawn(async move {
                while let Some(ev) = rx.recv().await {
                    seen.depth.fetch_sub(1, Ordering::AcqRel);
                    let fut = sub.on_event(ev.as_ref());
                    if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        tracing::warn!(
                            subscriber = sub.name(),
                            event = ev.kind.as_label(),
                            panic = panic_message(panic.as_ref()),
                            "subscriber panicked"
                        );
                    }
                }
            });

            channels.push(SubscriberChannel {
                name,
                warn_at,
                backlog,
                sender: tx,
            });
            workers.push(handle);
        }

        Self { channels, workers }
    }

    /// Fans out one event to all subscribers (non-blocking).
    pub fn emit(&self, event: &Event) {
        let ev = Arc::new(event.clone());
        for channel in &self.channels {
            // Counted before sending so the worker never decrements first.
            let depth = channel.backlog.depth.fetch_add(1, Ordering::AcqRel) + 1;
            if channel.sender.send(Arc::clone(&ev)).is_err() {
                channel.backlog.depth.fetch_sub(1, Ordering::AcqRel);
                tracing::warn!(
                    subscriber = channel.name,
                    seq = ev.seq,
                    "subscriber dropped event: worker closed"
                );
                continue;
            }
            if depth > channel.warn_at {
                if !channel.backlog.congested.swap(true, Ordering::AcqRel) {
                    tracing::warn!(
                        subscriber = channel.name,
                        depth,
                        "subscriber is falling behind"
                    );
                }
            } else if depth <= channel.warn_at / 2 {
                channel.backlog.congested.store(false, Ordering::Release);
            }
        }
    }

    /// Closes all queues and waits for the workers to drain them.
    pub async fn shutdown(self) {
        drop(self.channels);
        for h in self.workers {
            let _ = h.await;
        }
    }

    /// True if there are no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
