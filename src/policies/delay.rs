//! # Delay policy between a crash and the next spawn.
//!
//! [`DelayPolicy`] maps a 1-based attempt index to the time the supervisor
//! sleeps before spawning the child again. Three forms are supported:
//! - [`DelayPolicy::Constant`] the same delay for every attempt;
//! - [`DelayPolicy::Sequence`] an ordered list, the last entry repeats once exhausted;
//! - [`DelayPolicy::Function`] a caller-provided function of the attempt index.
//!
//! Values are used as given. There is no clamping and no jitter; a zero delay
//! still goes through the restart timer, so the spawn happens on the next
//! scheduler cycle and never inline.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use procvisor::DelayPolicy;
//!
//! let seq = DelayPolicy::sequence_ms([2, 100, 450, 40]);
//! assert_eq!(seq.delay_for(1), Duration::from_millis(2));
//! assert_eq!(seq.delay_for(4), Duration::from_millis(40));
//! assert_eq!(seq.delay_for(9), Duration::from_millis(40));
//!
//! let exp = DelayPolicy::function(|i| Duration::from_millis(50 << (i - 1)));
//! assert_eq!(exp.delay_for(3), Duration::from_millis(200));
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Shared delay-computing function: attempt index (1-based) → delay.
pub type DelayFn = Arc<dyn Fn(u32) -> Duration + Send + Sync + 'static>;

/// Policy computing the delay before restart attempt `n`.
#[derive(Clone)]
pub enum DelayPolicy {
    /// Same delay for every attempt.
    Constant(Duration),
    /// `sequence[min(n - 1, len - 1)]`; an empty sequence means no delay.
    Sequence(Arc<[Duration]>),
    /// Delay computed by the function; its result is trusted as-is.
    Function(DelayFn),
}

impl DelayPolicy {
    /// Constant delay in milliseconds.
    pub fn constant_ms(ms: u64) -> Self {
        DelayPolicy::Constant(Duration::from_millis(ms))
    }

    /// Ordered sequence of delays in milliseconds.
    pub fn sequence_ms(ms: impl IntoIterator<Item = u64>) -> Self {
        DelayPolicy::Sequence(ms.into_iter().map(Duration::from_millis).collect())
    }

    /// Delay computed from the attempt index.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        DelayPolicy::Function(Arc::new(f))
    }

    /// Returns the delay before restart attempt `attempt` (first restart = 1).
    ///
    /// An `attempt` of 0 is treated as 1 by the sequence form; the function
    /// form receives it unchanged.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            DelayPolicy::Constant(d) => *d,
            DelayPolicy::Sequence(seq) => {
                let Some(last) = seq.len().checked_sub(1) else {
                    return Duration::ZERO;
                };
                let idx = (attempt.saturating_sub(1) as usize).min(last);
                seq[idx]
            }
            DelayPolicy::Function(f) => f(attempt),
        }
    }
}

impl Default for DelayPolicy {
    /// Returns a constant delay of one second.
    fn default() -> Self {
        DelayPolicy::Constant(Duration::from_secs(1))
    }
}

impl From<Duration> for DelayPolicy {
    fn from(d: Duration) -> Self {
        DelayPolicy::Constant(d)
    }
}

impl From<Vec<Duration>> for DelayPolicy {
    fn from(v: Vec<Duration>) -> Self {
        DelayPolicy::Sequence(v.into())
    }
}

impl fmt::Debug for DelayPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DelayPolicy::Constant(d) => f.debug_tuple("Constant").field(d).finish(),
            DelayPolicy::Sequence(seq) => f.debug_tuple("Sequence").field(seq).finish(),
            DelayPolicy::Function(_) => f.write_str("Function(..)"),
        }
    }
}
