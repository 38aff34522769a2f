//! # Structured message channel (fork mode).
//!
//! In fork mode the child inherits one end of a Unix socket pair as file
//! descriptor 3, and [`CHANNEL_FD_ENV`] tells it where to look. Both directions
//! carry newline-delimited JSON: one value per line.
//!
//! ```text
//! supervisor                               child
//!   parent end ◄──── {"foo":"bar"}\n ────── fd 3
//!   parent end ───── {"cmd":"reload"}\n ──► fd 3
//! ```
//!
//! A shell child can talk on the channel with plain redirections:
//! `echo '{"foo":"bar"}' >&3`.

use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream as StdUnixStream;

use nix::fcntl::{FcntlArg, FdFlag, fcntl};
use nix::unistd::dup2;
use serde_json::Value;
use tokio::net::UnixStream;
use tokio::process::Command;

use crate::error::SupervisorError;

/// Descriptor number of the channel inside the child.
pub const CHANNEL_FD: RawFd = 3;

/// Environment variable exported to fork-mode children.
pub const CHANNEL_FD_ENV: &str = "PROCVISOR_CHANNEL_FD";

/// Socket pair for one child incarnation.
pub(crate) struct ChannelPair {
    parent: StdUnixStream,
    child: StdUnixStream,
}

impl ChannelPair {
    /// Creates a connected pair (both ends close-on-exec).
    pub(crate) fn new() -> Result<Self, SupervisorError> {
        let (parent, child) = StdUnixStream::pair().map_err(SupervisorError::Channel)?;
        Ok(Self { parent, child })
    }

    /// Makes the child end appear as [`CHANNEL_FD`] in the process spawned by `cmd`.
    ///
    /// Must be called after the command environment has been set up.
    pub(crate) fn install(&self, cmd: &mut Command) {
        let raw = self.child.as_raw_fd();
        cmd.env(CHANNEL_FD_ENV, CHANNEL_FD.to_string());

        // SAFETY: the closure runs between fork and exec and only calls
        // async-signal-safe functions (dup2, fcntl) on descriptors it owns.
        unsafe {
            cmd.pre_exec(move || {
                if raw == CHANNEL_FD {
                    fcntl(raw, FcntlArg::F_SETFD(FdFlag::empty()))?;
                } else {
                    dup2(raw, CHANNEL_FD)?;
                }
                Ok(())
            });
        }
    }

    /// Closes the child end in this process and returns the parent end.
    ///
    /// Call once the child has been spawned.
    pub(crate) fn into_parent(self) -> Result<UnixStream, SupervisorError> {
        drop(self.child);
        self.parent
            .set_nonblocking(true)
            .map_err(SupervisorError::Channel)?;
        UnixStream::from_std(self.parent).map_err(SupervisorError::Channel)
    }
}

/// Decodes one channel line. Blank lines yield `None`.
pub(crate) fn decode_line(line: &str) -> Option<Result<Value, SupervisorError>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(serde_json::from_str(line).map_err(SupervisorError::from))
}

/// Encodes one value as a channel line (with trailing newline).
pub(crate) fn encode_line(value: &Value) -> Result<Vec<u8>, SupervisorError> {
    let mut buf = serde_json::to_vec(value)?;
    buf.push(b'\n');
    Ok(buf)
}
