//! Runtime core: lifecycle state machine and the process shell around it.
//!
//! The public API from this module is [`Supervisor`] (built with
//! [`SupervisorBuilder`]) plus the types it hands out.
//!
//! Internal modules:
//! - [`machine`]: pure transition table; inputs in, ordered actions out;
//! - [`supervisor`]: executes actions, owns the bus, runs the control task;
//! - [`runner`]: spawns one child incarnation and relays its output and exit;
//! - [`child`]: handle to the live child;
//! - [`config`] / [`builder`]: construction.

mod builder;
mod child;
mod config;
mod info;
mod machine;
mod runner;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use child::ChildHandle;
pub use config::Config;
pub use info::SupervisorInfo;
pub use machine::Status;
pub use supervisor::Supervisor;
