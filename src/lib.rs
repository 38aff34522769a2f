//! # procvisor
//!
//! **Procvisor** keeps one external process alive.
//!
//! A [`Supervisor`] spawns the command described by a [`CommandSpec`],
//! restarts it when it exits unexpectedly (bounded by a [`RestartLimit`], paced
//! by a [`DelayPolicy`]), and reports everything that happens as a stream of
//! [`Event`]s: lifecycle transitions, raw stdout/stderr chunks, and structured
//! messages when the child is started in fork mode.
//!
//! ## Architecture
//! ```text
//!   caller                         Supervisor
//!   ──────                         ──────────────────────────────────────────────
//!   start()/stop() ──lock────────► Machine (pure transitions) ──► actions
//!   status()/info()                      │                          │
//!                                        │      ┌───────────────────┤
//!                                        │      ▼                   ▼
//!                                        │   runner: spawn     restart timer
//!                                        │   child + pumps     (tokio task)
//!                                        │      │                   │
//!                                        │      └──► control task ◄─┘
//!                                        │           (one per supervisor)
//!                                        ▼
//!                              Bus (broadcast, ordered by seq)
//!                                 ┌──────────┴───────────┐
//!                                 ▼                      ▼
//!                     Supervisor::subscribe()     SubscriberSet
//!                        (caller streams)      (per-subscriber queues)
//! ```
//!
//! ### Lifecycle
//! ```text
//!  stopped ──start()──► running ──unexpected exit──► crashing ──timer──► running
//!     ▲                  │   │                          │
//!     │               stop() └─exit, budget spent──► crashed
//!     │                  ▼                              │
//!     └──── exit ─── stopping                           │
//!     ▲                                                 │
//!     └──────────────────── stop() ─────────────────────┘
//! ```
//!
//! Every episode ends with exactly one `stop` event.
//!
//! ## Features
//! | Area              | Description                                            | Key types / traits                    |
//! |-------------------|--------------------------------------------------------|---------------------------------------|
//! | **Supervision**   | Start, stop and observe one child process.             | [`Supervisor`], [`Status`]            |
//! | **Policies**      | Restart budget and delay between restarts.             | [`RestartLimit`], [`DelayPolicy`]     |
//! | **Events**        | Ordered lifecycle and output notifications.            | [`Event`], [`EventKind`]              |
//! | **Subscriber API**| Push events into custom handlers.                      | [`Subscribe`], [`SubscriberSet`]      |
//! | **Commands**      | Program, args, cwd, env overrides, fork channel.       | [`CommandSpec`]                       |
//! | **Errors**        | Typed errors for the structured channel and signals.   | [`SupervisorError`]                   |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] that renders events via `tracing`.
//!
//! ## Example
//! ```rust,no_run
//! use procvisor::{CommandSpec, Config, DelayPolicy, EventKind, RestartLimit, Supervisor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let spec = CommandSpec::new("/bin/sh").args(["-c", "echo tick; sleep 1; exit 1"]);
//!     let sup = Supervisor::builder(spec)
//!         .config(Config {
//!             max_restarts: RestartLimit::Limited(3),
//!             sleep: DelayPolicy::sequence_ms([100, 500, 1000]),
//!             ..Config::default()
//!         })
//!         .inherit_env()
//!         .build();
//!
//!     let mut events = sup.subscribe();
//!     sup.start();
//!
//!     while let Ok(ev) = events.recv().await {
//!         println!("{} {:?}", ev.kind.as_label(), ev.pid);
//!         if ev.kind == EventKind::Stop {
//!             break;
//!         }
//!     }
//!     assert_eq!(sup.status().as_str(), "crashed");
//! }
//! ```
mod command;
mod core;
mod error;
mod events;
mod policies;
mod subscribers;

// ---- Public re-exports ----

pub use command::{CHANNEL_FD, CHANNEL_FD_ENV, CommandSpec};
pub use core::{ChildHandle, Config, Status, Supervisor, SupervisorBuilder, SupervisorInfo};
pub use error::SupervisorError;
pub use events::{Bus, Event, EventKind};
pub use nix::sys::signal::Signal;
pub use policies::{DelayFn, DelayPolicy, RestartLimit, RestartPolicy};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
