//! # Event subscriber trait.
//!
//! `Subscribe` is the extension point for reacting to supervisor events outside
//! the caller's own `subscribe()` stream. Each subscriber is driven by a
//! dedicated worker fed by a queue owned by the
//! [`SubscriberSet`](crate::subscribers::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow (I/O, batching); they block neither the
//!   supervisor nor other subscribers.
//! - Every event reaches every subscriber, in order. A subscriber that falls
//!   more than [`Subscribe::queue_capacity`] events behind gets a `tracing`
//!   warning, never a gap.
//! - A subscriber may call back into the supervisor (`stop()`, `start()`).
//!
//! ## Example
//! ```rust
//! use std::sync::{Arc, Weak};
//! use procvisor::{Event, EventKind, Subscribe, Supervisor};
//!
//! /// Stops the supervisor the first time the child writes to stderr.
//! struct StopOnStderr(Weak<Supervisor>);
//!
//! #[async_trait::async_trait]
//! impl Subscribe for StopOnStderr {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::Stderr {
//!             if let Some(sup) = self.0.upgrade() {
//!                 sup.stop();
//!             }
//!         }
//!     }
//!     fn name(&self) -> &'static str { "stop-on-stderr" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
///
/// Called from a subscriber-dedicated worker task. Implementations should avoid
/// blocking the async runtime.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles a single event.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Queue depth above which a backlog warning is logged.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
