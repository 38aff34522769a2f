//! Restart policies.
//!
//! This module groups the knobs that control **whether** a crashed child is
//! spawned again and **how long** to wait before doing so.
//!
//! ## Contents
//! - [`RestartLimit`] the restart budget of one episode (limited / unlimited)
//! - [`DelayPolicy`]  how long to sleep before attempt `n` (constant / sequence / function)
//! - [`RestartPolicy`] both of the above, as consumed by the state machine
//!
//! ## Quick wiring
//! ```text
//! Config { max_restarts: RestartLimit, sleep: DelayPolicy, .. }
//!      └─► core::machine::Machine uses:
//!           - limit.allows(restart_count) to decide restart vs. crashed
//!           - delay.delay_for(attempt) to arm the restart timer
//! ```
//!
//! ## Defaults
//! - `RestartLimit::Limited(10)`.
//! - `DelayPolicy::Constant(1s)`.

mod delay;
mod restart;

pub use delay::{DelayFn, DelayPolicy};
pub use restart::{RestartLimit, RestartPolicy};
