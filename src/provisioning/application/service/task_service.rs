use crate::ProxmoxClient;
use crate::core::domain::error::{ProxmoxError, ProxmoxResult, TaskError};
use crate::core::domain::value_object::Upid;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, error};

/// Default delay between two status requests.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Default time a task may take before waiting is abandoned.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(300);

/// Fixed-interval polling policy for hypervisor tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl TaskPolicy {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

impl Default for TaskPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TASK_TIMEOUT,
        }
    }
}

/// Waits for asynchronous tasks on one node to finish.
pub struct TaskService<'a> {
    client: &'a ProxmoxClient,
    node: &'a str,
    policy: TaskPolicy,
}

impl<'a> TaskService<'a> {
    pub fn new(client: &'a ProxmoxClient, node: &'a str, policy: TaskPolicy) -> Self {
        Self {
            client,
            node,
            policy,
        }
    }

    /// Polls the task until it stops.
    ///
    /// # Errors
    ///
    /// - `TaskError::Failed` when the task stops with an exit status other than `OK`
    /// - `TaskError::Timeout` when it is still running after the policy timeout, including
    ///   a status request that has not answered by then
    /// - any API error raised by a status request
    pub async fn wait(&self, upid: &Upid) -> ProxmoxResult<()> {
        let started = Instant::now();
        let mut polls = 0u32;

        loop {
            let remaining = self.policy.timeout.saturating_sub(started.elapsed());
            let status = match timeout(remaining, self.client.task_status(self.node, upid)).await {
                Ok(status) => status?,
                Err(_) => return Err(self.timed_out(upid)),
            };
            polls += 1;

            if status.is_stopped() {
                if status.succeeded() {
                    debug!(%upid, polls, "task finished");
                    return Ok(());
                }
                let payload = status.payload();
                error!(%upid, payload = %payload, "task failed");
                return Err(TaskError::Failed {
                    upid: upid.to_string(),
                    exitstatus: status.exitstatus.unwrap_or_default(),
                    payload,
                }
                .into());
            }

            if started.elapsed() >= self.policy.timeout {
                return Err(self.timed_out(upid));
            }

            sleep(self.policy.poll_interval).await;
        }
    }

    fn timed_out(&self, upid: &Upid) -> ProxmoxError {
        error!(%upid, timeout = ?self.policy.timeout, "task timeout");
        TaskError::Timeout {
            upid: upid.to_string(),
            timeout: self.policy.timeout,
        }
        .into()
    }
}
