use std::collections::BTreeMap;

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

/// State key: behavior name
pub const NAME: &str = "name";
/// State key: visibility, `Shared` by default
pub const VISIBILITY: &str = "visibility";
/// State key: minimum number of sources
pub const MIN_NUM_OF_SOURCES: &str = "min_num_of_sources";
/// State key: set of trusted source identifiers
pub const SOURCES_IDENTIFIERS: &str = "sources_identifiers";
/// State key: stored `source;;;id` pairs of persisted sources
pub const SOURCES_IDENTIFIERS_IDS: &str = "sources_identifiers_ids";

const DEFAULT_VISIBILITY: &str = "Shared";

const BEHAVIOR_FIELDS: &str =
    "id name visibility behaviorType numOfSources sourcesIdentifiers { id source }";

/// One trusted source with its server id
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TrustedSourceSource {
    /// Server id
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub id: String,
    /// Source identifier
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub source: String,
}

/// Trusted sources behavior as returned by the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedSourceBehavior {
    /// Server id
    pub id: String,
    /// Behavior name
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub name: String,
    /// Visibility
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub visibility: String,
    /// Behavior type, `TrustedSources`
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub behavior_type: String,
    /// Minimum number of sources
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub num_of_sources: i64,
    /// Sources with their ids
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub sources_identifiers: Vec<TrustedSourceSource>,
}

/// `TrustedSourceBehaviorInput`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTrustedSourceBehaviorInput {
    /// Behavior name
    pub name: String,
    /// Visibility
    pub visibility: String,
    /// Minimum number of sources
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_of_sources: Option<i64>,
    /// Initial sources
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources_identifiers: Vec<String>,
}

/// `TrustedSourceBehaviorUpdateInput`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTrustedSourceBehaviorInput {
    /// New name, unchanged when `None`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New visibility, unchanged when `None`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    /// New minimum, unchanged when `None`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_of_sources: Option<i64>,
    /// Sources to add
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_sources_identifiers: Vec<String>,
    /// Ids of sources to remove
    #[serde(
        rename = "removeSourcesIdentifiers",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub remove_sources_identifiers_ids: Vec<String>,
}

/// Create a trusted sources behavior
pub async fn new_trusted_source_behavior(
    client: &Client,
    input: &CreateTrustedSourceBehaviorInput,
) -> Result<TrustedSourceBehavior> {
    let mut variables = Map::new();
    variables.insert("ownerId".to_string(), Value::Null);
    variables.insert("practiceId".to_string(), Value::Null);
    variables.insert(
        "behaviorInput".to_string(),
        to_variable("newTrustedSourceBehavior", input)?,
    );
    let query = format!(
        "mutation newTrustedSourceBehavior($ownerId: ID, $practiceId: ID, \
         $behaviorInput: TrustedSourceBehaviorInput) \
         {{ newTrustedSourceBehavior(ownerId: $ownerId, practiceId: $practiceId, \
         behaviorInput: $behaviorInput) {{ {BEHAVIOR_FIELDS} }} }}"
    );

    client
        .execute_as(
            &GraphQlRequest::with_variables(query, variables),
            "newTrustedSourceBehavior",
        )
        .await
        .map_err(|e| InextError::api("failed to create new TrustedSourceBehavior", e))
}

/// Fetch a trusted sources behavior
pub async fn get_trusted_source_behavior(
    client: &Client,
    id: &str,
) -> Result<TrustedSourceBehavior> {
    let query = format!(
        "{{ getTrustedSourceBehavior(id: {}) {{ {BEHAVIOR_FIELDS} }} }}",
        quote(id)
    );

    client
        .execute_as(&GraphQlRequest::new(query), "getTrustedSourceBehavior")
        .await
        .map_err(|e| InextError::api("failed to get TrustedSourceBehavior", e))
}

/// Returns the server's verdict on whether the update was applied
pub async fn update_trusted_source_behavior(
    client: &Client,
    id: &str,
    input: &UpdateTrustedSourceBehaviorInput,
) -> Result<bool> {
    let mut variables = Map::new();
    variables.insert(
        "behaviorInput".to_string(),
        to_variable("updateTrustedSourceBehavior", input)?,
    );
    variables.insert("id".to_string(), Value::String(id.to_string()));

    client
        .execute_as(
            &GraphQlRequest::with_variables(
                "mutation updateTrustedSourceBehavior(\
                 $behaviorInput: TrustedSourceBehaviorUpdateInput, $id: ID!) \
                 { updateTrustedSourceBehavior(behaviorInput: $behaviorInput, id: $id) }",
                variables,
            ),
            "updateTrustedSourceBehavior",
        )
        .await
        .map_err(|e| InextError::api("failed to update TrustedSourceBehavior", e))
}

/// Returns the server's verdict on whether the behavior was deleted
pub async fn delete_trusted_source_behavior(client: &Client, id: &str) -> Result<bool> {
    let query = format!(
        "mutation deleteBehavior {{ deleteBehavior(id: {}) }}",
        quote(id)
    );

    client
        .execute_as(&GraphQlRequest::new(query), "deleteBehavior")
        .await
        .map_err(|e| InextError::api("failed to delete TrustedSourceBehavior", e))
}

fn visibility(state: &ResourceState) -> Result<String> {
    Ok(state
        .get_str(VISIBILITY)?
        .filter(|visibility| !visibility.is_empty())
        .unwrap_or(DEFAULT_VISIBILITY)
        .to_string())
}

fn as_set(sources: Vec<String>) -> BTreeMap<String, ()> {
    sources.into_iter().map(|source| (source, ())).collect()
}

/// Build the create input from the desired values
pub fn create_input_from_state(
    state: &ResourceState,
) -> Result<CreateTrustedSourceBehaviorInput> {
    Ok(CreateTrustedSourceBehaviorInput {
        name: state.require_str(NAME)?.to_string(),
        visibility: visibility(state)?,
        num_of_sources: state.get_i64(MIN_NUM_OF_SOURCES)?,
        sources_identifiers: state.get_string_list(SOURCES_IDENTIFIERS)?,
    })
}

/// Build the update input from the fields that changed since the last persist
pub fn update_input_from_state(
    state: &ResourceState,
) -> Result<UpdateTrustedSourceBehaviorInput> {
    let mut input = UpdateTrustedSourceBehaviorInput::default();

    if state.has_change(NAME) {
        input.name = Some(state.require_str(NAME)?.to_string());
    }
    if state.has_change(VISIBILITY) {
        input.visibility = Some(visibility(state)?);
    }
    if state.has_change(MIN_NUM_OF_SOURCES) {
        input.num_of_sources = state.get_i64(MIN_NUM_OF_SOURCES)?;
    }

    if state.has_change(SOURCES_IDENTIFIERS) {
        let stored_ids = state.get_string_list(SOURCES_IDENTIFIERS_IDS)?;
        let ids = parse_stored_ids(
            SOURCES_IDENTIFIERS_IDS,
            stored_ids.iter().map(String::as_str),
        )?;
        // Sources are a set: there is nothing to update, only add and remove
        let changes = diff(
            &as_set(state.prior_string_list(SOURCES_IDENTIFIERS)?),
            &as_set(state.get_string_list(SOURCES_IDENTIFIERS)?),
            |source| ids.get(source).cloned(),
        );

        input.add_sources_identifiers = changes
            .added
            .into_iter()
            .map(|(source, ())| source)
            .collect();
        input.remove_sources_identifiers_ids = changes.removed_ids;
    }

    Ok(input)
}

/// Overwrite `state` with the server's view of the behavior and mark it persisted
pub fn write_to_state(behavior: TrustedSourceBehavior, state: &mut ResourceState) {
    let (sources, ids): (Vec<Value>, Vec<Value>) = behavior
        .sources_identifiers
        .into_iter()
        .map(|entry| {
            let stored = format_stored_id(&entry.source, &entry.id);
            (Value::String(entry.source), Value::String(stored))
        })
        .unzip();

    state.set_id(behavior.id);
    state.set(NAME, behavior.name);
    state.set(VISIBILITY, behavior.visibility);
    state.set(MIN_NUM_OF_SOURCES, behavior.num_of_sources);
    state.set(SOURCES_IDENTIFIERS, sources);
    state.set(SOURCES_IDENTIFIERS_IDS, ids);
    state.mark_persisted();
}

/// `inext_trusted_sources`
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustedSourcesResource;

#[async_trait]
impl Resource for TrustedSourcesResource {
    fn type_name(&self) -> &'static str {
        "inext_trusted_sources"
    }

    async fn create(&self, client: &Client, state: &mut ResourceState) -> Result<()> {
        let input = create_input_from_state(state)?;
        let behavior =
            discard_on_error(client, new_trusted_source_behavior(client, &input).await).await?;
        info!("Created trusted sources behavior {}", behavior.id);
        write_to_state(behavior, state);
        Ok(())
    }

    async fn read(&self, client: &Client, state: &mut ResourceState) -> Result<()> {
        match absent_if_not_found(get_trusted_source_behavior(client, state.id()).await)? {
            Some(behavior) => write_to_state(behavior, state),
            None => {
                warn!("Trusted sources behavior {} no longer exists", state.id());
                state.clear_id();
            }
        }
        Ok(())
    }

    async fn update(&self, client: &Client, state: &mut ResourceState) -> Result<()> {
        let input = update_input_from_state(state)?;
        let applied = update_trusted_source_behavior(client, state.id(), &input)
            .await
            .and_then(|applied| require_applied("updateTrustedSourceBehavior", applied));
        discard_on_error(client, applied).await?;

        let behavior = get_trusted_source_behavior(client, state.id()).await?;
        write_to_state(behavior, state);
        Ok(())
    }

    async fn delete(&self, client: &Client, state: &mut ResourceState) -> Result<()> {
        let deleted = delete_trusted_source_behavior(client, state.id())
            .await
            .and_then(|deleted| require_applied("deleteBehavior", deleted));
        discard_on_error(client, deleted).await?;
        state.clear_id();
        Ok(())
    }
}
