//! Declarative resources mapped onto GraphQL mutations.
//!
//! Each resource translates a [`ResourceState`] into create/read/update/delete
//! calls. A failed mutation discards the session's staged changes before the
//! error is returned, so a half-applied change is never left pending.

/// docker profile resource
pub mod docker_profile;

/// publish/enforce trigger resource
pub mod publish_enforce;

mod state;

/// trusted sources behavior resource
pub mod trusted_sources;

pub use state::ResourceState;

use async_trait::async_trait;
use log::warn;
use serde::Serialize;
use serde_json::Value;

use crate::{
    api::{client::Client, ApiError},
    errors::{InextError, Result},
    publish_enforce::discard_changes,
};

/// Lifecycle of one resource type
#[async_trait]
pub trait Resource: Send + Sync {
    /// Resource type name, e.g. `inext_docker_profile`
    fn type_name(&self) -> &'static str;

    /// Create the object described by `state` and bind `state` to it
    async fn create(&self, client: &Client, state: &mut ResourceState) -> Result<()>;

    /// Refresh `state` from the server. A missing object clears the id.
    async fn read(&self, client: &Client, state: &mut ResourceState) -> Result<()>;

    /// Apply the difference between the persisted and desired values
    async fn update(&self, client: &Client, state: &mut ResourceState) -> Result<()>;

    /// Delete the object and clear the id
    async fn delete(&self, client: &Client, state: &mut ResourceState) -> Result<()>;
}

/// Discard the session's staged changes when `result` is an error.
///
/// The original error is returned either way; a failed discard is attached to it.
pub(crate) async fn discard_on_error<T>(client: &Client, result: Result<T>) -> Result<T> {
    let err = match result {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    warn!("Discarding staged changes after failure: {err}");
    match discard_changes(client).await {
        Ok(()) => Err(err),
        Err(discard) => Err(err.with_discard_failure(discard)),
    }
}

/// Turn a boolean mutation result into an error when the server reports `false`
pub(crate) fn require_applied(operation: &str, applied: bool) -> Result<()> {
    if applied {
        Ok(())
    } else {
        Err(InextError::unexpected_response(
            operation,
            "server reported the change was not applied",
        ))
    }
}

/// Serialize a mutation input into a GraphQL variable
pub(crate) fn to_variable<T: Serialize>(operation: &str, input: &T) -> Result<Value> {
    serde_json::to_value(input).map_err(|e| {
        InextError::api(
            operation,
            ApiError::configuration(format!("failed to serialize input: {e}")),
        )
    })
}

/// Map a not-found read onto an absent object
pub(crate) fn absent_if_not_found<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}
