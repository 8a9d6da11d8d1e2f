use async_trait::async_trait;
use derive_new::new;
use log::info;
use tokio_util::sync::CancellationToken;

use crate::{
    api::client::Client,
    errors::Result,
    publish_enforce::{PublishEnforce, PublishOptions},
    resources::{Resource, ResourceState},
    tasks::PollSettings,
};

/// Only one trigger resource exists per session
pub const SINGLETON_ID: &str = "publish-enforce-singleton";

/// Run an async publish when true
pub const PUBLISH: &str = "publish";
/// Run an enforce when true
pub const ENFORCE: &str = "enforce";
/// Profile types the publish is restricted to
pub const PROFILE_TYPES: &str = "profile_types";
/// Skip nginx validation during publish
pub const SKIP_NGINX_VALIDATION: &str = "skip_nginx_validation";
/// Profiles to enforce, all when empty
pub const PROFILE_IDS: &str = "profile_ids";

/// Async publish arguments held in `state`
pub fn publish_options_from_state(state: &ResourceState) -> Result<PublishOptions> {
    Ok(PublishOptions {
        profile_types: state.get_string_list(PROFILE_TYPES)?,
        skip_nginx_validation: state.get_bool(SKIP_NGINX_VALIDATION)?,
    })
}

/// `inext_publish_enforce`: runs an async publish and/or an enforce whenever it
/// is created or updated. Nothing is stored server side.
#[derive(Debug, Clone, new)]
pub struct PublishEnforceResource {
    cancel: CancellationToken,
    #[new(value = "PollSettings::provider()")]
    poll: PollSettings,
}

impl PublishEnforceResource {
    #[must_use]
    /// Replace the provider poll budget
    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    async fn trigger(&self, client: &Client, state: &mut ResourceState) -> Result<()> {
        state.set_id(SINGLETON_ID);
        let workflow = PublishEnforce::new(client.clone(), self.poll);

        if state.get_bool(PUBLISH)? {
            let options = publish_options_from_state(state)?;
            let task_id = workflow.publish_async(&self.cancel, &options).await?;
            info!("Publish task {task_id} succeeded");
        }

        if state.get_bool(ENFORCE)? {
            let profile_ids = state.get_string_list(PROFILE_IDS)?;
            let task_id = workflow.enforce(&self.cancel, &profile_ids).await?;
            info!("Enforce policy task {task_id} succeeded");
        }

        state.mark_persisted();
        Ok(())
    }
}

#[async_trait]
impl Resource for PublishEnforceResource {
    fn type_name(&self) -> &'static str {
        "inext_publish_enforce"
    }

    async fn create(&self, client: &Client, state: &mut ResourceState) -> Result<()> {
        self.trigger(client, state).await
    }

    async fn read(&self, _client: &Client, _state: &mut ResourceState) -> Result<()> {
        Ok(())
    }

    async fn update(&self, client: &Client, state: &mut ResourceState) -> Result<()> {
        self.trigger(client, state).await
    }

    async fn delete(&self, _client: &Client, state: &mut ResourceState) -> Result<()> {
        state.clear_id();
        Ok(())
    }
}
