//! This crate provides the core logic for managing Infinity Next policy:
//! - GraphQL session client with authentication and rate-limit retry
//! - Polling of asynchronous server tasks
//! - Publish, enforce and discard of staged changes
//! - Declarative resources mapped onto GraphQL mutations
//!

pub mod api;
mod errors;
pub mod publish_enforce;
pub mod resources;
pub mod settings_diff;
pub mod tasks;

// Re-exports for a small, focused public API
pub use api::client::{Client, ClientConfig};
pub use api::graphql::{GraphQlError, GraphQlRequest, GraphQlResponse};
pub use api::region::Region;
pub use api::{ApiError, ApiResult};
pub use errors::{InextError, Result};
pub use publish_enforce::{
    discard_changes, PublishEnforce, PublishOptions, PublishOutcome, TaskOperation,
};
pub use resources::{Resource, ResourceState};
pub use tasks::{wait_for_completion, PollSettings, TaskStatus, TaskStatusSource};
