use serde::Deserialize;

use crate::{api::graphql::quote, tasks::TaskStatus};

/// A validation error or warning attached to a publish result
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ValidationMessage {
    /// Plain text message
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub message: String,
}

/// Value of the `publishChanges` mutation
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishChangesResult {
    /// Whether the staged changes were accepted
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub is_valid: bool,
    /// Validation errors, in server order
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub errors: Vec<ValidationMessage>,
    /// Validation warnings, in server order
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub warnings: Vec<ValidationMessage>,
}

/// Successful publish. Warnings are returned to the caller, never dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Warning messages, in server order
    pub warnings: Vec<String>,
}

impl PublishOutcome {
    /// Returns `true` when the server attached warnings to the publish
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Arguments of `asyncPublishChanges`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Restrict publishing to these profile types; empty publishes all
    pub profile_types: Vec<String>,
    /// Ask the server to skip nginx configuration validation
    pub skip_nginx_validation: bool,
}

/// Value of the `enforcePolicy` mutation
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EnforcePolicyResult {
    /// Task id, empty when the server omitted it
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub id: String,
}

/// Value of the `getTask` query
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskResult {
    /// Task id
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub id: String,
    /// Current status
    pub status: TaskStatus,
}

/// Kind of asynchronous task, used in task error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOperation {
    /// Task created by `enforcePolicy`
    EnforcePolicy,
    /// Task created by `asyncPublishChanges`
    Publish,
}

impl TaskOperation {
    /// Lower-case name used in messages ("enforce policy task ... failed")
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EnforcePolicy => "enforce policy",
            Self::Publish => "publish",
        }
    }
}

fn quoted_list(values: &[String]) -> String {
    values
        .iter()
        .map(|value| quote(value))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) const PUBLISH_CHANGES_MUTATION: &str =
    "mutation publishChanges { publishChanges { isValid errors { message } warnings { message } } }";

pub(crate) const DISCARD_CHANGES_MUTATION: &str = "mutation discardChanges { discardChanges }";

pub(crate) fn enforce_policy_mutation(profile_ids: &[String]) -> String {
    if profile_ids.is_empty() {
        "mutation {enforcePolicy {id}}".to_string()
    } else {
        format!(
            "mutation {{enforcePolicy(profilesIds: [{}]) {{id}}}}",
            quoted_list(profile_ids)
        )
    }
}

pub(crate) fn async_publish_mutation(options: &PublishOptions) -> String {
    let mut args = Vec::new();
    if !options.profile_types.is_empty() {
        args.push(format!(
            "profileTypes: [{}]",
            quoted_list(&options.profile_types)
        ));
    }
    if options.skip_nginx_validation {
        args.push("skipNginxValidation: true".to_string());
    }

    if args.is_empty() {
        "mutation {asyncPublishChanges}".to_string()
    } else {
        format!("mutation {{asyncPublishChanges({})}}", args.join(", "))
    }
}

pub(crate) fn get_task_query(task_id: &str) -> String {
    format!("query {{getTask(id: {}) {{id status}}}}", quote(task_id))
}
