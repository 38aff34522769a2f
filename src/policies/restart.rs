//! # Restart budget.
//!
//! [`RestartLimit`] bounds how many crash-triggered respawns one episode may
//! perform. It follows the integer `maxRestarts` convention used by process
//! managers:
//!
//! ```text
//! -1   → RestartLimit::Unlimited     restart until stop() is called
//!  0   → RestartLimit::Limited(0)    never restart; first crash is final
//!  n   → RestartLimit::Limited(n)    n restarts beyond the initial spawn
//! <-1  → RestartLimit::Limited(0)    treated as "no budget"
//! ```
//!
//! [`RestartPolicy`] pairs the limit with the [`DelayPolicy`] and is what the
//! state machine consults after every unexpected exit.

use serde::{Deserialize, Serialize};

use crate::policies::DelayPolicy;

/// Maximum number of crash-triggered restarts within one episode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartLimit {
    /// Restart forever.
    Unlimited,
    /// Allow this many restarts beyond the initial spawn.
    Limited(u32),
}

impl RestartLimit {
    /// Maps the integer `maxRestarts` convention (`-1` = unlimited).
    pub fn from_max_restarts(n: i64) -> Self {
        match n {
            -1 => RestartLimit::Unlimited,
            n if n < 0 => RestartLimit::Limited(0),
            n => RestartLimit::Limited(n.min(u32::MAX as i64) as u32),
        }
    }

    /// Returns the integer form (`-1` for unlimited).
    pub fn as_max_restarts(&self) -> i64 {
        match self {
            RestartLimit::Unlimited => -1,
            RestartLimit::Limited(n) => i64::from(*n),
        }
    }

    /// Returns `true` if another restart is allowed after `restarts` have already happened.
    #[inline]
    pub fn allows(&self, restarts: u32) -> bool {
        match self {
            RestartLimit::Unlimited => true,
            RestartLimit::Limited(max) => restarts < *max,
        }
    }
}

impl Default for RestartLimit {
    /// Returns [`RestartLimit::Limited`] with a budget of 10.
    fn default() -> Self {
        RestartLimit::Limited(10)
    }
}

/// Restart budget plus delay computation.
#[derive(Clone, Debug, Default)]
pub struct RestartPolicy {
    /// How many restarts one episode may perform.
    pub limit: RestartLimit,
    /// How long to wait before each restart.
    pub delay: DelayPolicy,
}

impl RestartPolicy {
    /// Creates a policy from its parts.
    pub fn new(limit: RestartLimit, delay: DelayPolicy) -> Self {
        Self { limit, delay }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_max_restarts_convention() {
        assert_eq!(RestartLimit::from_max_restarts(-1), RestartLimit::Unlimited);
        assert_eq!(RestartLimit::from_max_restarts(0), RestartLimit::Limited(0));
        assert_eq!(RestartLimit::from_max_restarts(5), RestartLimit::Limited(5));
        assert_eq!(RestartLimit::from_max_restarts(-7), RestartLimit::Limited(0));
    }

    #[test]
    fn test_as_max_restarts_roundtrips_sentinel() {
        assert_eq!(RestartLimit::Unlimited.as_max_restarts(), -1);
        assert_eq!(RestartLimit::Limited(3).as_max_restarts(), 3);
    }

    #[test]
    fn test_limited_allows_exactly_n() {
        let limit = RestartLimit::Limited(2);
        assert!(limit.allows(0));
        assert!(limit.allows(1));
        assert!(!limit.allows(2));
        assert!(!limit.allows(3));
    }

    #[test]
    fn test_zero_never_allows() {
        assert!(!RestartLimit::Limited(0).allows(0));
    }

    #[test]
    fn test_unlimited_always_allows() {
        assert!(RestartLimit::Unlimited.allows(u32::MAX));
    }
}
