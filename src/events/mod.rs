//! Supervisor notifications: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publisher**: the supervisor control path (`core::supervisor`), always
//!   under the state lock.
//! - **Consumers**: `Supervisor::subscribe()` receivers. `SubscriberSet` is
//!   fed directly by the publisher and never lags.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
