//! # One child incarnation: spawn, relay, wait.
//!
//! [`launch`] spawns the process described by a [`CommandSpec`] and hands back
//! a [`ChildHandle`]. Everything else about the incarnation runs in a detached
//! waiter task that reports to the supervisor's control channel:
//!
//! ```text
//!                    ┌──► stdout pump ──► Report::Stdout(chunk) ─┐
//!   launch() ─ spawn ├──► stderr pump ──► Report::Stderr(chunk) ─┤
//!                    ├──► channel reader ─► Report::Message(v) ──┼──► control channel
//!                    └──► waiter ── child.wait() ─ drain pumps ─► Report::Exited
//!                           ▲
//!     signal requests ──────┘ (stop: signal, then SIGKILL after kill_timeout → Report::ForceKill)
//! ```
//!
//! ## Rules
//! - Output is forwarded as raw chunks, exactly as read. No line splitting.
//! - `Exited` is the last report of an incarnation; pumps are drained first
//!   (bounded by [`DRAIN_TIMEOUT`]) so no chunk trails the exit.
//! - Every report carries the incarnation number; the supervisor drops reports
//!   from incarnations it no longer tracks.
//! - Signals are only delivered before the child is reaped; afterwards the
//!   request channel is closed.
//! - When the supervisor is dropped (token cancelled) the child is killed and
//!   reaped without further reports.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use nix::sys::signal::Signal;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::command::CommandSpec;
use crate::command::channel::{ChannelPair, decode_line};
use crate::error::SupervisorError;

use super::child::{ChildHandle, Request, deliver};
use super::supervisor::Control;

/// Upper bound on waiting for output pumps after the child exited.
///
/// Only reached when a grandchild keeps the pipes open.
pub(crate) const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

const CHUNK: usize = 8 * 1024;

/// What an incarnation tells the supervisor.
#[derive(Debug)]
pub(crate) enum Report {
    Stdout(Bytes),
    Stderr(Bytes),
    Message(Value),
    Warn(String),
    ForceKill,
    Exited {
        code: Option<i32>,
        signal: Option<i32>,
    },
}

/// Everything needed to start one incarnation.
pub(crate) struct Launch<'a> {
    pub spec: &'a CommandSpec,
    pub env: &'a BTreeMap<OsString, OsString>,
    pub incarnation: u64,
    pub kill_timeout: Option<Duration>,
    pub control: mpsc::UnboundedSender<Control>,
    pub token: CancellationToken,
}

/// Spawns the child and its waiter task.
///
/// Must be called from within a tokio runtime.
pub(crate) fn launch(l: Launch<'_>) -> Result<ChildHandle, SupervisorError> {
    let mut cmd = Command::new(l.spec.program());
    cmd.args(l.spec.get_args())
        .env_clear()
        .envs(l.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = l.spec.get_cwd() {
        cmd.current_dir(dir);
    }

    let pair = if l.spec.is_fork() {
        let pair = ChannelPair::new()?;
        pair.install(&mut cmd);
        Some(pair)
    } else {
        None
    };

    let mut child = cmd.spawn().map_err(SupervisorError::Spawn)?;
    let pid = child.id().ok_or_else(|| {
        SupervisorError::Spawn(std::io::Error::other("child reaped before its pid was read"))
    })?;

    // On error `child` is dropped here and killed by kill_on_drop.
    let channel = pair.map(ChannelPair::into_parent).transpose()?;

    let reporter = Reporter {
        control: l.control,
        incarnation: l.incarnation,
        pid,
    };

    let mut pumps = JoinSet::new();
    if let Some(out) = child.stdout.take() {
        pumps.spawn(pump(out, reporter.clone(), Report::Stdout));
    }
    if let Some(err) = child.stderr.take() {
        pumps.spawn(pump(err, reporter.clone(), Report::Stderr));
    }

    let outbox = channel.map(|stream| {
        let (read, write) = stream.into_split();
        let (tx, rx) = mpsc::unbounded_channel();
        pumps.spawn(read_messages(read, reporter.clone()));
        tokio::spawn(write_messages(write, rx));
        tx
    });

    let (requests, requests_rx) = mpsc::unbounded_channel();
    tokio::spawn(wait(Waiter {
        child,
        pumps,
        requests: requests_rx,
        kill_timeout: l.kill_timeout,
        token: l.token,
        reporter,
    }));

    Ok(ChildHandle::new(pid, l.incarnation, requests, outbox))
}

/// Tags reports with the incarnation they belong to.
#[derive(Clone)]
struct Reporter {
    control: mpsc::UnboundedSender<Control>,
    incarnation: u64,
    pid: u32,
}

impl Reporter {
    fn send(&self, report: Report) {
        let _ = self.control.send(Control::Runner {
            incarnation: self.incarnation,
            pid: self.pid,
            report,
        });
    }
}

struct Waiter {
    child: Child,
    pumps: JoinSet<()>,
    requests: mpsc::UnboundedReceiver<Request>,
    kill_timeout: Option<Duration>,
    token: CancellationToken,
    reporter: Reporter,
}

async fn wait(mut w: Waiter) {
    let pid = w.reporter.pid;
    let force = time::sleep(Duration::ZERO);
    tokio::pin!(force);
    let mut armed = false;

    let status = loop {
        tokio::select! {
            res = w.child.wait() => break res,
            Some(request) = w.requests.recv() => {
                let (signal, stop) = match request {
                    Request::Stop(signal) => (signal, true),
                    Request::Signal(signal) => (signal, false),
                };
                if let Err(e) = deliver(pid, signal) {
                    tracing::warn!(pid, %signal, error = %e, "signal not delivered");
                    w.reporter.send(Report::Warn(e.to_string()));
                }
                if let (true, false, Some(after)) = (stop, armed, w.kill_timeout) {
                    force.as_mut().reset(Instant::now() + after);
                    armed = true;
                }
            }
            () = &mut force, if armed => {
                armed = false;
                tracing::warn!(pid, "child ignored stop signal, sending SIGKILL");
                match deliver(pid, Signal::SIGKILL) {
                    Ok(()) => w.reporter.send(Report::ForceKill),
                    Err(e) => w.reporter.send(Report::Warn(e.to_string())),
                }
            }
            () = w.token.cancelled() => {
                let _ = w.child.start_kill();
                let _ = w.child.wait().await;
                w.pumps.abort_all();
                return;
            }
        }
    };
    w.requests.close();

    let drained = time::timeout(DRAIN_TIMEOUT, async {
        while w.pumps.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        tracing::debug!(pid, "output still open after exit, abandoning pumps");
        w.pumps.abort_all();
    }

    let (code, signal) = match status {
        Ok(st) => (st.code(), st.signal()),
        Err(e) => {
            w.reporter.send(Report::Warn(format!("wait failed: {e}")));
            (None, None)
        }
    };
    w.reporter.send(Report::Exited { code, signal });
}

async fn pump<R>(mut src: R, reporter: Reporter, wrap: fn(Bytes) -> Report)
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(CHUNK);
    loop {
        buf.reserve(CHUNK);
        match src.read_buf(&mut buf).await {
            Ok(0) => break,
            Ok(_) => reporter.send(wrap(buf.split().freeze())),
            Err(e) => {
                tracing::debug!(pid = reporter.pid, error = %e, "output pump failed");
                break;
            }
        }
    }
}

async fn read_messages(src: OwnedReadHalf, reporter: Reporter) {
    let mut lines = BufReader::new(src).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match decode_line(&line) {
                None => {}
                Some(Ok(value)) => reporter.send(Report::Message(value)),
                Some(Err(e)) => reporter.send(Report::Warn(e.to_string())),
            },
            Ok(None) => break,
            Err(e) => {
                reporter.send(Report::Warn(format!("channel read failed: {e}")));
                break;
            }
        }
    }
}

async fn write_messages(mut dst: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(line) = rx.recv().await {
        if let Err(e) = dst.write_all(&line).await {
            tracing::debug!(error = %e, "channel write failed");
            break;
        }
    }
}
