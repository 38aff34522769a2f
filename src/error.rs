//! Error types used by the supervisor.
//!
//! [`SupervisorError`] covers failures of the mechanical collaborators: spawning
//! the child, delivering signals, and reading or writing the structured channel.
//!
//! Lifecycle operations (`start`, `stop`) never return these errors. Spawn and
//! signal failures are reported through the event stream instead (`warn`,
//! `exit`, `crash`); only [`Supervisor::send`](crate::Supervisor::send) hands a
//! `SupervisorError` back to the caller.
//!
//! The type provides helper methods (`as_label`, `as_message`) for logs/metrics.

use thiserror::Error;

/// # Errors produced while driving a child process.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// The OS refused to create the process (e.g. executable not found).
    #[error("failed to spawn child: {0}")]
    Spawn(#[source] std::io::Error),

    /// Setting up or using the structured channel failed.
    #[error("structured channel i/o failed: {0}")]
    Channel(#[source] std::io::Error),

    /// A signal could not be delivered to the child.
    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        /// Target process id.
        pid: u32,
        /// Underlying errno.
        #[source]
        source: nix::Error,
    },

    /// A structured message could not be encoded or decoded.
    #[error("invalid structured message: {0}")]
    Decode(#[from] serde_json::Error),

    /// The operation needs a running child.
    #[error("no child is running")]
    NotRunning,

    /// The running child was not started in fork mode.
    #[error("child has no structured channel (fork mode disabled)")]
    NoChannel,
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use procvisor::SupervisorError;
    ///
    /// assert_eq!(SupervisorError::NotRunning.as_label(), "not_running");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::Spawn(_) => "spawn_failed",
            SupervisorError::Channel(_) => "channel_io",
            SupervisorError::Signal { .. } => "signal_failed",
            SupervisorError::Decode(_) => "message_decode",
            SupervisorError::NotRunning => "not_running",
            SupervisorError::NoChannel => "no_channel",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            SupervisorError::Spawn(e) => format!("spawn: {e}"),
            SupervisorError::Channel(e) => format!("channel: {e}"),
            SupervisorError::Signal { pid, source } => format!("signal pid={pid}: {source}"),
            SupervisorError::Decode(e) => format!("decode: {e}"),
            SupervisorError::NotRunning => "not running".to_string(),
            SupervisorError::NoChannel => "no structured channel".to_string(),
        }
    }

    /// Indicates whether the child could still be alive after this error.
    ///
    /// Returns `false` only for spawn failures, where no process exists.
    pub fn child_may_exist(&self) -> bool {
        !matches!(self, SupervisorError::Spawn(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_error_message_carries_io_error() {
        let err = SupervisorError::Spawn(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such file",
        ));
        assert_eq!(err.as_label(), "spawn_failed");
        assert!(err.to_string().contains("no such file"));
        assert!(!err.child_may_exist());
    }

    #[test]
    fn test_signal_error_mentions_pid() {
        let err = SupervisorError::Signal {
            pid: 4242,
            source: nix::Error::ESRCH,
        };
        assert!(err.as_message().contains("4242"));
        assert!(err.child_may_exist());
    }

    #[test]
    fn test_decode_from_serde() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json");
        let err: SupervisorError = match parse {
            Ok(_) => panic!("input must not parse"),
            Err(e) => e.into(),
        };
        assert_eq!(err.as_label(), "message_decode");
    }
}
