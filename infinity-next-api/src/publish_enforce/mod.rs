//! Publish, enforce and discard of staged policy changes.
//!
//! The free functions issue exactly one GraphQL call each. [`PublishEnforce`]
//! composes them with the task poller into the user level operations.

mod models;

pub use models::{
    EnforcePolicyResult, PublishChangesResult, PublishOptions, PublishOutcome, TaskOperation,
    TaskResult, ValidationMessage,
};

use async_trait::async_trait;
use derive_new::new;
use log::{debug, info};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{
    api::{client::Client, graphql::GraphQlRequest},
    errors::{InextError, Result},
    tasks::{wait_for_completion, PollSettings, TaskStatus, TaskStatusSource},
};

/// Publish the staged changes of the session.
///
/// Fails with [`InextError::Validation`] carrying every error message when the
/// server rejects the changes. Warnings of an accepted publish are returned.
pub async fn publish_changes(client: &Client) -> Result<PublishOutcome> {
    let result: PublishChangesResult = client
        .execute_as(
            &GraphQlRequest::new(models::PUBLISH_CHANGES_MUTATION),
            "publishChanges",
        )
        .await
        .map_err(|e| InextError::api("publishChanges", e))?;

    if !result.is_valid {
        return Err(InextError::validation(
            result.errors.into_iter().map(|m| m.message).collect(),
        ));
    }

    let warnings: Vec<String> = result.warnings.into_iter().map(|m| m.message).collect();
    debug!("Published changes with {} warnings", warnings.len());
    Ok(PublishOutcome { warnings })
}

/// Start an asynchronous publish and return its task id.
pub async fn async_publish_changes(client: &Client, options: &PublishOptions) -> Result<String> {
    let value = client
        .execute(
            &GraphQlRequest::new(models::async_publish_mutation(options)),
            "asyncPublishChanges",
        )
        .await
        .map_err(|e| InextError::api("asyncPublishChanges", e))?;

    match value {
        Value::String(id) => Ok(id),
        other => Err(InextError::unexpected_response(
            "asyncPublishChanges",
            format!("expected a task id string, got {other}"),
        )),
    }
}

/// Start an enforce of the given profiles (all profiles when empty) and return
/// its task id. The id may be empty when the server omitted it.
pub async fn enforce_policy(client: &Client, profile_ids: &[String]) -> Result<String> {
    let result: EnforcePolicyResult = client
        .execute_as(
            &GraphQlRequest::new(models::enforce_policy_mutation(profile_ids)),
            "enforcePolicy",
        )
        .await
        .map_err(|e| InextError::api("enforcePolicy", e))?;

    Ok(result.id)
}

/// Fetch the current status of a task.
pub async fn get_task_status(client: &Client, task_id: &str) -> Result<TaskStatus> {
    let result: TaskResult = client
        .execute_as(
            &GraphQlRequest::new(models::get_task_query(task_id)),
            "getTask",
        )
        .await
        .map_err(|e| InextError::api(format!("getTask {task_id}"), e))?;

    Ok(result.status)
}

/// Discard the staged changes of the session.
///
/// Succeeds only when the server answers an explicit `true`.
pub async fn discard_changes(client: &Client) -> Result<()> {
    let value = client
        .execute(
            &GraphQlRequest::new(models::DISCARD_CHANGES_MUTATION),
            "discardChanges",
        )
        .await
        .map_err(|e| InextError::api("discardChanges", e))?;

    match value {
        Value::Bool(true) => Ok(()),
        Value::Bool(false) => Err(InextError::DiscardRejected),
        other => Err(InextError::unexpected_response(
            "discardChanges",
            format!("expected a boolean, got {other}"),
        )),
    }
}

#[async_trait]
impl TaskStatusSource for Client {
    async fn task_status(&self, task_id: &str) -> Result<TaskStatus> {
        get_task_status(self, task_id).await
    }
}

/// Publish/enforce workflow bound to one configured client
#[derive(Debug, Clone, new)]
pub struct PublishEnforce {
    client: Client,
    poll: PollSettings,
}

impl PublishEnforce {
    /// The session client
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// Poll settings used for enforce and async publish
    pub const fn poll_settings(&self) -> PollSettings {
        self.poll
    }

    /// Publish staged changes synchronously.
    pub async fn publish(&self) -> Result<PublishOutcome> {
        publish_changes(&self.client).await
    }

    /// Publish asynchronously and wait for the publish task to succeed.
    ///
    /// Returns the task id.
    pub async fn publish_async(
        &self,
        cancel: &CancellationToken,
        options: &PublishOptions,
    ) -> Result<String> {
        let task_id = async_publish_changes(&self.client, options).await?;
        self.await_task(cancel, TaskOperation::Publish, task_id)
            .await
    }

    /// Enforce the given profiles (all when empty) and wait for the enforce task
    /// to succeed.
    ///
    /// Returns the task id.
    pub async fn enforce(
        &self,
        cancel: &CancellationToken,
        profile_ids: &[String],
    ) -> Result<String> {
        let task_id = enforce_policy(&self.client, profile_ids).await?;
        self.await_task(cancel, TaskOperation::EnforcePolicy, task_id)
            .await
    }

    /// Discard staged changes.
    pub async fn discard(&self) -> Result<()> {
        discard_changes(&self.client).await
    }

    async fn await_task(
        &self,
        cancel: &CancellationToken,
        operation: TaskOperation,
        task_id: String,
    ) -> Result<String> {
        if task_id.is_empty() {
            return Err(InextError::EmptyTaskId {
                operation: operation.as_str().to_string(),
            });
        }

        info!("Waiting for {} task {task_id}", operation.as_str());
        let status =
            wait_for_completion(cancel, self.client.clone(), &task_id, self.poll).await?;

        match status {
            TaskStatus::Succeeded => Ok(task_id),
            TaskStatus::Failed => Err(InextError::TaskFailed {
                operation: operation.as_str().to_string(),
                task_id,
            }),
            other => Err(InextError::UnknownTaskStatus {
                operation: operation.as_str().to_string(),
                task_id,
                status: other.to_string(),
            }),
        }
    }
}
