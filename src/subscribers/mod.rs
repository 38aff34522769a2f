//! # Event subscribers.
//!
//! [`Subscribe`] is the trait for pushing supervisor events into custom
//! handlers; [`SubscriberSet`] fans events out to them. Callers that prefer a
//! pull model use [`Supervisor::subscribe`](crate::Supervisor::subscribe)
//! instead.
//!
//! ```text
//!   Supervisor ── publish(Event) ──┬──► Bus ──► Supervisor::subscribe() streams
//!                                  └──► SubscriberSet::emit
//!                                         ├──► LogWriter (feature "logging")
//!                                         └──► custom subscribers
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
