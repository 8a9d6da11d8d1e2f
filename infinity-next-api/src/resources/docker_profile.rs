use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    api::{
        client::Client,
        graphql::{quote, GraphQlRequest},
    },
    errors::{InextError, Result},
    resources::{
        absent_if_not_found, discard_on_error, require_applied, to_variable, Resource,
        ResourceState,
    },
    settings_diff::{diff, format_stored_id, parse_stored_ids},
};

/// State key: profile name
pub const NAME: &str = "name";
/// State key: profile type reported by the server
pub const PROFILE_TYPE: &str = "profile_type";
/// State key: additional settings as a key to value map
pub const ADDITIONAL_SETTINGS: &str = "additional_settings";
/// State key: stored `key;;;id` pairs of persisted settings
pub const ADDITIONAL_SETTINGS_IDS: &str = "additional_settings_ids";
/// State key: only allow defined applications
pub const DEFINED_APPLICATIONS_ONLY: &str = "defined_applications_only";
/// State key: agent limit, 0 to 1000
pub const MAX_NUMBER_OF_AGENTS: &str = "max_number_of_agents";
/// State key: agent registration token (computed)
pub const AUTHENTICATION_TOKEN: &str = "authentication_token";

const MAX_AGENTS_LIMIT: i64 = 1000;

const PROFILE_FIELDS: &str = "id name profileType authentication { token maxNumberOfAgents } \
     additionalSettings { id key value } onlyDefinedApplications";

/// A key/value pair as stored by the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct KeyValue {
    /// Server id of the setting
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub id: String,
    /// Setting key
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub key: String,
    /// Setting value
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub value: String,
}

/// Reusable token authentication of a profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReusableTokenAuthentication {
    /// Token agents use to register to the profile
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub token: String,
    /// Maximum number of agents using the token
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub max_number_of_agents: i64,
}

/// Docker profile as returned by the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerProfile {
    /// Server id
    pub id: String,
    /// Profile name
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub name: String,
    /// Profile type, `Docker`
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub profile_type: String,
    /// Agent authentication
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub authentication: ReusableTokenAuthentication,
    /// Additional settings with their ids
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub additional_settings: Vec<KeyValue>,
    /// Only allow defined applications
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub only_defined_applications: bool,
}

/// New setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyValueInput {
    /// Setting key
    pub key: String,
    /// Setting value
    pub value: String,
}

/// Change of an existing setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyValueUpdateInput {
    /// Server id of the setting
    pub id: String,
    /// Setting key
    pub key: String,
    /// New value
    pub value: String,
}

/// Authentication part of a profile input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReusableTokenAuthenticationInput {
    /// Agent limit, unchanged when `None`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_number_of_agents: Option<i64>,
}

/// `DockerProfileInput`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDockerProfileInput {
    /// Profile name
    pub name: String,
    /// Initial additional settings
    pub additional_settings: Vec<KeyValueInput>,
    /// Only allow defined applications
    #[serde(skip_serializing_if = "Option::is_none")]
    pub only_defined_applications: Option<bool>,
    /// Agent authentication
    pub authentication: ReusableTokenAuthenticationInput,
}

/// `DockerProfileUpdateInput`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerProfileUpdateInput {
    /// New name, unchanged when `None`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Settings to add
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_additional_settings: Vec<KeyValueInput>,
    /// Settings to change
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub update_additional_settings: Vec<KeyValueUpdateInput>,
    /// Ids of settings to remove
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_additional_settings: Vec<String>,
    /// Only allow defined applications
    pub only_defined_applications: bool,
    /// Agent authentication
    pub authentication: ReusableTokenAuthenticationInput,
}

/// Create a docker profile
pub async fn new_docker_profile(
    client: &Client,
    input: &CreateDockerProfileInput,
) -> Result<DockerProfile> {
    let mut variables = Map::new();
    variables.insert(
        "profileInput".to_string(),
        to_variable("newDockerProfile", input)?,
    );
    let query = format!(
        "mutation newDockerProfile($profileInput: DockerProfileInput) \
         {{ newDockerProfile(profileInput: $profileInput) {{ {PROFILE_FIELDS} }} }}"
    );

    client
        .execute_as(
            &GraphQlRequest::with_variables(query, variables),
            "newDockerProfile",
        )
        .await
        .map_err(|e| InextError::api("failed to create new DockerProfile", e))
}

/// Fetch a docker profile; a null result is [`InextError::is_not_found`]
pub async fn get_docker_profile(client: &Client, id: &str) -> Result<DockerProfile> {
    let query = format!(
        "{{ getDockerProfile(id: {}) {{ {PROFILE_FIELDS} }} }}",
        quote(id)
    );

    client
        .execute_as(&GraphQlRequest::new(query), "getDockerProfile")
        .await
        .map_err(|e| InextError::api("failed to get DockerProfile", e))
}

/// Returns the server's verdict on whether the update was applied
pub async fn update_docker_profile(
    client: &Client,
    id: &str,
    input: &DockerProfileUpdateInput,
) -> Result<bool> {
    let mut variables = Map::new();
    variables.insert(
        "profileInput".to_string(),
        to_variable("updateDockerProfile", input)?,
    );
    variables.insert("id".to_string(), Value::String(id.to_string()));

    client
        .execute_as(
            &GraphQlRequest::with_variables(
                "mutation updateDockerProfile($profileInput: DockerProfileUpdateInput, $id: ID!) \
                 { updateDockerProfile(profileInput: $profileInput, id: $id) }",
                variables,
            ),
            "updateDockerProfile",
        )
        .await
        .map_err(|e| InextError::api("failed to update DockerProfile", e))
}

/// Returns the server's verdict on whether the profile was deleted
pub async fn delete_docker_profile(client: &Client, id: &str) -> Result<bool> {
    let query = format!(
        "mutation deleteProfile {{ deleteProfile(id: {}) }}",
        quote(id)
    );

    client
        .execute_as(&GraphQlRequest::new(query), "deleteProfile")
        .await
        .map_err(|e| InextError::api("failed to delete DockerProfile", e))
}

fn max_number_of_agents(state: &ResourceState) -> Result<Option<i64>> {
    let value = state.get_i64(MAX_NUMBER_OF_AGENTS)?;
    if let Some(count) = value {
        if !(0..=MAX_AGENTS_LIMIT).contains(&count) {
            return Err(InextError::resource_state(
                MAX_NUMBER_OF_AGENTS,
                format!("expected a value between 0 and {MAX_AGENTS_LIMIT}, got {count}"),
            ));
        }
    }
    Ok(value)
}

/// Build the create input from the desired values
pub fn create_input_from_state(state: &ResourceState) -> Result<CreateDockerProfileInput> {
    Ok(CreateDockerProfileInput {
        name: state.require_str(NAME)?.to_string(),
        additional_settings: state
            .get_string_map(ADDITIONAL_SETTINGS)?
            .into_iter()
            .map(|(key, value)| KeyValueInput { key, value })
            .collect(),
        only_defined_applications: Some(state.get_bool(DEFINED_APPLICATIONS_ONLY)?),
        authentication: ReusableTokenAuthenticationInput {
            max_number_of_agents: max_number_of_agents(state)?,
        },
    })
}

/// Build the update input from the fields that changed since the last persist
pub fn update_input_from_state(state: &ResourceState) -> Result<DockerProfileUpdateInput> {
    let mut input = DockerProfileUpdateInput {
        only_defined_applications: state.get_bool(DEFINED_APPLICATIONS_ONLY)?,
        authentication: ReusableTokenAuthenticationInput {
            max_number_of_agents: max_number_of_agents(state)?,
        },
        ..DockerProfileUpdateInput::default()
    };

    if state.has_change(NAME) {
        input.name = Some(state.require_str(NAME)?.to_string());
    }

    if state.has_change(ADDITIONAL_SETTINGS) {
        let stored_ids = state.get_string_list(ADDITIONAL_SETTINGS_IDS)?;
        let ids = parse_stored_ids(
            ADDITIONAL_SETTINGS_IDS,
            stored_ids.iter().map(String::as_str),
        )?;
        let changes = diff(
            &state.prior_string_map(ADDITIONAL_SETTINGS)?,
            &state.get_string_map(ADDITIONAL_SETTINGS)?,
            |key| ids.get(key).cloned(),
        );

        input.add_additional_settings = changes
            .added
            .into_iter()
            .map(|(key, value)| KeyValueInput { key, value })
            .collect();
        input.update_additional_settings = changes
            .updated
            .into_iter()
            .map(|(id, key, value)| KeyValueUpdateInput { id, key, value })
            .collect();
        input.remove_additional_settings = changes.removed_ids;
    }

    Ok(input)
}

/// Overwrite `state` with the server's view of the profile and mark it persisted
pub fn write_to_state(profile: DockerProfile, state: &mut ResourceState) {
    let mut settings = Map::new();
    let mut settings_ids = Vec::with_capacity(profile.additional_settings.len());
    for setting in profile.additional_settings {
        settings_ids.push(Value::String(format_stored_id(&setting.key, &setting.id)));
        settings.insert(setting.key, Value::String(setting.value));
    }

    state.set_id(profile.id);
    state.set(NAME, profile.name);
    state.set(PROFILE_TYPE, profile.profile_type);
    state.set(DEFINED_APPLICATIONS_ONLY, profile.only_defined_applications);
    state.set(
        MAX_NUMBER_OF_AGENTS,
        profile.authentication.max_number_of_agents,
    );
    state.set(AUTHENTICATION_TOKEN, profile.authentication.token);
    state.set(ADDITIONAL_SETTINGS, settings);
    state.set(ADDITIONAL_SETTINGS_IDS, settings_ids);
    state.mark_persisted();
}

/// `inext_docker_profile`
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerProfileResource;

#[async_trait]
impl Resource for DockerProfileResource {
    fn type_name(&self) -> &'static str {
        "inext_docker_profile"
    }

    async fn create(&self, client: &Client, state: &mut ResourceState) -> Result<()> {
        let input = create_input_from_state(state)?;
        let profile = discard_on_error(client, new_docker_profile(client, &input).await).await?;
        info!("Created docker profile {}", profile.id);
        write_to_state(profile, state);
        Ok(())
    }

    async fn read(&self, client: &Client, state: &mut ResourceState) -> Result<()> {
        match absent_if_not_found(get_docker_profile(client, state.id()).await)? {
            Some(profile) => write_to_state(profile, state),
            None => {
                warn!("Docker profile {} no longer exists", state.id());
                state.clear_id();
            }
        }
        Ok(())
    }

    async fn update(&self, client: &Client, state: &mut ResourceState) -> Result<()> {
        let input = update_input_from_state(state)?;
        let applied = update_docker_profile(client, state.id(), &input)
            .await
            .and_then(|applied| require_applied("updateDockerProfile", applied));
        discard_on_error(client, applied).await?;

        let profile = get_docker_profile(client, state.id()).await?;
        write_to_state(profile, state);
        Ok(())
    }

    async fn delete(&self, client: &Client, state: &mut ResourceState) -> Result<()> {
        let deleted = delete_docker_profile(client, state.id())
            .await
            .and_then(|deleted| require_applied("deleteProfile", deleted));
        discard_on_error(client, deleted).await?;
        state.clear_id();
        Ok(())
    }
}
