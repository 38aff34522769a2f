//! # Supervisor configuration.
//!
//! Provides [`Config`]: restart budget, delay policy, stop behavior, event bus
//! sizing and the descriptive metadata reported by
//! [`Supervisor::info`](crate::Supervisor::info).
//!
//! ## Sentinel values
//! - `max_restarts = RestartLimit::Unlimited` → restart until `stop()`
//! - `kill_timeout = None` or `Some(0s)` → never escalate to `SIGKILL`

use std::time::Duration;

use nix::sys::signal::Signal;
use serde_json::Value;

use crate::policies::{DelayPolicy, RestartLimit, RestartPolicy};

/// Configuration of one supervisor.
///
/// ## Field semantics
/// - `name`: label attached to every event and to `info()`
/// - `max_restarts`: restart budget per episode
/// - `sleep`: delay before each restart
/// - `kill_timeout`: how long a stopping child may ignore its stop signal
/// - `stop_signal`: signal sent by `stop()`
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `data`: opaque user metadata echoed by `info()`
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over reading sentinels
/// directly.
#[derive(Clone, Debug)]
pub struct Config {
    /// Optional human-readable name.
    pub name: Option<String>,

    /// Restart budget per episode.
    ///
    /// Counts restarts **beyond** the initial spawn: `Limited(3)` allows up to
    /// four spawns in one episode.
    pub max_restarts: RestartLimit,

    /// Delay before each restart.
    pub sleep: DelayPolicy,

    /// Grace period between the stop signal and `SIGKILL`.
    ///
    /// - `None` / `Some(0s)` = wait for the child indefinitely
    /// - `Some(d)` = after `d`, send `SIGKILL` and publish `force_kill`
    pub kill_timeout: Option<Duration>,

    /// Signal sent to the child by `stop()`.
    pub stop_signal: Signal,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Receivers that fall more than `bus_capacity` events behind get `Lagged`
    /// and skip older items.
    pub bus_capacity: usize,

    /// Opaque metadata reported by `info()`.
    pub data: Option<Value>,
}

impl Config {
    /// Returns the restart policy the state machine consults.
    pub fn restart_policy(&self) -> RestartPolicy {
        RestartPolicy::new(self.max_restarts, self.sleep.clone())
    }

    /// Returns the kill escalation timeout as an `Option` (zero is `None`).
    #[inline]
    pub fn kill_timeout(&self) -> Option<Duration> {
        self.kill_timeout.filter(|d| !d.is_zero())
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `max_restarts = Limited(10)`
    /// - `sleep = 1s` constant
    /// - `kill_timeout = 30s`
    /// - `stop_signal = SIGTERM`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            name: None,
            max_restarts: RestartLimit::default(),
            sleep: DelayPolicy::default(),
            kill_timeout: Some(Duration::from_secs(30)),
            stop_signal: Signal::SIGTERM,
            bus_capacity: 1024,
            data: None,
        }
    }
}
