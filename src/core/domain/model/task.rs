//! Task status as reported by `/nodes/{node}/tasks/{upid}/status`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Exit status Proxmox reports for a task that finished cleanly.
pub const TASK_EXIT_OK: &str = "OK";

/// Snapshot of an asynchronous task.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TaskStatus {
    /// `running` or `stopped`.
    pub status: String,
    /// Only present once the task has stopped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exitstatus: Option<String>,
    /// Remaining fields (`type`, `user`, `starttime`, ...), kept for diagnostics.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskStatus {
    pub fn is_stopped(&self) -> bool {
        self.status == "stopped"
    }

    pub fn succeeded(&self) -> bool {
        self.is_stopped() && self.exitstatus.as_deref() == Some(TASK_EXIT_OK)
    }

    /// Full payload rendered for failure logs.
    pub fn payload(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}
