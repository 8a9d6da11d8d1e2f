//! Error handling module

use std::time::Duration;

use thiserror::Error;

use crate::api::ApiError;

/// Result type alias for operations that can fail with `InextError`
pub type Result<T> = std::result::Result<T, InextError>;

/// Errors raised by the task poller, the publish/enforce orchestrator and the
/// resource lifecycle glue.
///
/// Protocol level failures arrive wrapped in [`InextError::Api`] together with the
/// name of the operation that produced them.
#[derive(Error, Debug)]
pub enum InextError {
    /// A GraphQL or authentication call failed
    #[error("{operation}: {source}")]
    Api {
        /// The operation that failed (e.g. "publishChanges", "getTask")
        operation: String,
        /// The underlying API error
        #[source]
        source: ApiError,
    },

    /// Publishing was rejected by server side validation
    #[error("failed publishing changes with errors: {}", .messages.join(", "))]
    Validation {
        /// Validation messages in server order
        messages: Vec<String>,
    },

    /// A mutation that must return a task id returned an empty one
    #[error("{operation} returned an empty task id")]
    EmptyTaskId {
        /// The task kind, e.g. "enforce policy"
        operation: String,
    },

    /// The task reached the `Failed` state
    #[error("{operation} task {task_id} failed")]
    TaskFailed {
        /// The task kind, e.g. "enforce policy"
        operation: String,
        /// Server side task id
        task_id: String,
    },

    /// The task left `InProgress` with a status this client does not know
    #[error("{operation} task {task_id} done with unknown status {status}")]
    UnknownTaskStatus {
        /// The task kind, e.g. "publish"
        operation: String,
        /// Server side task id
        task_id: String,
        /// The status reported by the server
        status: String,
    },

    /// The task did not reach a terminal state within the poll budget
    #[error("task {task_id} did not complete in time (waited {timeout:?})")]
    TimedOut {
        /// Server side task id
        task_id: String,
        /// The budget that was exhausted
        timeout: Duration,
    },

    /// The caller cancelled while waiting for the task
    #[error("waiting for task {task_id} was cancelled")]
    Cancelled {
        /// Server side task id
        task_id: String,
    },

    /// The background poller ended without reporting a result
    #[error("poller for task {task_id} stopped without reporting a result")]
    PollerAborted {
        /// Server side task id
        task_id: String,
    },

    /// The discard mutation completed but did not report success
    #[error("failed to discard changes")]
    DiscardRejected,

    /// A response value had an unexpected shape
    #[error("unexpected response from {operation}: {message}")]
    UnexpectedResponse {
        /// The operation that returned the value
        operation: String,
        /// What was wrong with it
        message: String,
    },

    /// A resource state field is missing or malformed
    #[error("invalid resource field {field}: {message}")]
    ResourceState {
        /// State key
        field: String,
        /// What is wrong with it
        message: String,
    },

    /// A mutation failed and discarding the staged changes failed as well
    #[error("{source}; additionally failed to discard changes: {discard}")]
    WithDiscardFailure {
        /// The original failure
        #[source]
        source: Box<InextError>,
        /// The failure of the follow-up discard
        discard: Box<InextError>,
    },
}

impl InextError {
    /// Returns `true` when waiting for a task ran out of time.
    ///
    /// Callers should report this as "did not complete in time" rather than as
    /// a failure of the task itself.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    /// Returns `true` when the requested object does not exist on the server.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { source, .. } if source.is_not_found())
    }

    /// Wrap an API error with the operation that produced it
    pub(crate) fn api(operation: impl Into<String>, source: ApiError) -> Self {
        Self::Api {
            operation: operation.into(),
            source,
        }
    }

    /// Create a publish validation error
    pub(crate) const fn validation(messages: Vec<String>) -> Self {
        Self::Validation { messages }
    }

    pub(crate) fn unexpected_response(
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::UnexpectedResponse {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub(crate) fn resource_state(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ResourceState {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Attach a failed discard to the error that triggered it
    pub(crate) fn with_discard_failure(self, discard: Self) -> Self {
        Self::WithDiscardFailure {
            source: Box::new(self),
            discard: Box::new(discard),
        }
    }
}

impl From<ApiError> for InextError {
    fn from(error: ApiError) -> Self {
        Self::Api {
            operation: "unknown operation".to_string(),
            source: error,
        }
    }
}
