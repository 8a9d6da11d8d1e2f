//! Polling of asynchronous server side tasks.
//!
//! Enforce and async publish return a task id. [`wait_for_completion`] observes
//! that task on a background tokio task and races it against a timeout and the
//! caller's [`CancellationToken`]. The background poller runs on a child token
//! that is cancelled whenever the wait returns, so it never outlives the caller.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use log::{debug, trace};
use serde::Deserialize;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::errors::{InextError, Result};

/// Status of a server side task
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum TaskStatus {
    /// Still running
    InProgress,
    /// Finished successfully
    Succeeded,
    /// Finished with an error
    Failed,
    /// Any other status reported by the server
    Other(String),
}

impl TaskStatus {
    /// Returns `true` while the task has not reached a terminal state.
    #[must_use]
    pub const fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// Server representation of the status
    pub fn as_str(&self) -> &str {
        match self {
            Self::InProgress => "InProgress",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Other(status) => status,
        }
    }
}

impl From<String> for TaskStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "InProgress" => Self::InProgress,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            _ => Self::Other(status),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Poll cadence and wall-clock budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay between status checks
    pub interval: Duration,
    /// Total time allowed for the task to leave `InProgress`
    pub timeout: Duration,
}

impl PollSettings {
    /// Interactive command line budget: 200ms cadence, 10s total
    #[must_use]
    pub const fn cli() -> Self {
        Self {
            interval: Duration::from_millis(200),
            timeout: Duration::from_secs(10),
        }
    }

    /// Resource lifecycle budget: 300ms cadence, 5 minutes total
    #[must_use]
    pub const fn provider() -> Self {
        Self {
            interval: Duration::from_millis(300),
            timeout: Duration::from_secs(5 * 60),
        }
    }

    /// Same cadence with a different total budget
    #[must_use]
    pub const fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            interval: self.interval,
            timeout,
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::cli()
    }
}

/// Anything that can report the status of a task
#[async_trait]
pub trait TaskStatusSource: Send + Sync + 'static {
    /// Fetch the current status of `task_id`
    async fn task_status(&self, task_id: &str) -> Result<TaskStatus>;
}

/// Wait until `task_id` leaves `InProgress`.
///
/// Returns the first non-`InProgress` status verbatim. A failed status check ends
/// the wait immediately with that error. Otherwise the wait ends with
/// [`InextError::TimedOut`] after `settings.timeout`, or with
/// [`InextError::Cancelled`] as soon as `cancel` fires.
pub async fn wait_for_completion<S: TaskStatusSource>(
    cancel: &CancellationToken,
    source: S,
    task_id: &str,
    settings: PollSettings,
) -> Result<TaskStatus> {
    let poller_token = cancel.child_token();
    let _stop_poller = poller_token.clone().drop_guard();
    let (tx, rx) = oneshot::channel();

    let id = task_id.to_string();
    tokio::spawn(async move {
        let outcome = tokio::select! {
            () = poller_token.cancelled() => {
                trace!("Poller for task {id} stopped");
                return;
            }
            outcome = poll_until_terminal(&source, &id, settings.interval) => outcome,
        };
        // The receiver is gone when the caller already returned
        let _ = tx.send(outcome);
    });

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(InextError::Cancelled {
            task_id: task_id.to_string(),
        }),
        outcome = rx => outcome.unwrap_or_else(|_| {
            Err(InextError::PollerAborted {
                task_id: task_id.to_string(),
            })
        }),
        () = tokio::time::sleep(settings.timeout) => Err(InextError::TimedOut {
            task_id: task_id.to_string(),
            timeout: settings.timeout,
        }),
    }
}

async fn poll_until_terminal<S: TaskStatusSource>(
    source: &S,
    task_id: &str,
    interval: Duration,
) -> Result<TaskStatus> {
    loop {
        let status = source.task_status(task_id).await?;
        debug!("Task {task_id} status: {status}");
        if !status.is_in_progress() {
            return Ok(status);
        }
        tokio::time::sleep(interval).await;
    }
}
