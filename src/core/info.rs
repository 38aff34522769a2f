//! Serializable snapshot of a supervisor, as returned by
//! [`Supervisor::info`](crate::Supervisor::info).

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::machine::Status;

/// Point-in-time view of a supervisor.
///
/// ```text
/// {
///   "name": "worker",
///   "status": "running",
///   "pid": 4242,
///   "incarnation": 3,
///   "started_at": "2025-01-01T00:00:00Z",
///   "restarts": 2,
///   "max_restarts": 10,
///   "command": ["/usr/bin/worker", "--port", "80"],
///   "cwd": null,
///   "env": { "RUST_LOG": "info" },
///   "fork": false,
///   "data": null
/// }
/// ```
#[derive(Clone, Debug, Serialize)]
pub struct SupervisorInfo {
    /// Configured name.
    pub name: Option<String>,
    /// Current status.
    pub status: Status,
    /// Pid of the live child.
    pub pid: Option<u32>,
    /// Incarnation number of the live child.
    pub incarnation: Option<u64>,
    /// Spawn time of the live child.
    pub started_at: Option<DateTime<Utc>>,
    /// Restarts performed in the current episode.
    pub restarts: u32,
    /// Restart budget (`-1` = unlimited).
    pub max_restarts: i64,
    /// Program followed by its arguments.
    pub command: Vec<String>,
    /// Working directory override.
    pub cwd: Option<PathBuf>,
    /// Environment overrides (the ambient environment is not included).
    pub env: BTreeMap<String, String>,
    /// Whether the structured channel is enabled.
    pub fork: bool,
    /// User metadata from the config.
    pub data: Option<Value>,
}

impl SupervisorInfo {
    /// Renders the snapshot as a JSON value.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
