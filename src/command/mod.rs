//! # Child command description and process plumbing.
//!
//! - [`CommandSpec`] what to run: program, args, cwd, env overrides, fork flag
//! - [`channel`] the fork-mode structured message channel (fd 3, JSON lines)

pub(crate) mod channel;
mod spec;

pub use channel::{CHANNEL_FD, CHANNEL_FD_ENV};
pub use spec::CommandSpec;
