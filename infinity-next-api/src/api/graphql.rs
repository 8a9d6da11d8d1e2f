use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A query or mutation together with its variables
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphQlRequest {
    /// Query or mutation text
    pub query: String,
    /// Variable name to JSON value
    pub variables: Map<String, Value>,
}

impl GraphQlRequest {
    /// Build a request without variables.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: Map::new(),
        }
    }

    /// Build a request with the given variables.
    pub fn with_variables(query: impl Into<String>, variables: Map<String, Value>) -> Self {
        Self {
            query: query.into(),
            variables,
        }
    }
}

/// Render a string as a GraphQL string literal, escaped like JSON
pub(crate) fn quote(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

/// Decode an explicit `null` the same way as a missing key.
///
/// GraphQL lists and scalars are nullable, so servers may send `"errors": null`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Extension data attached to a GraphQL error by the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlErrorExtension {
    /// Machine readable error code
    #[serde(default)]
    pub code: Option<String>,
    /// Correlation id for server side logs
    #[serde(default)]
    pub reference_id: Option<String>,
    /// Parameters used to render the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_params: Option<Value>,
}

/// GraphQL path segment: a field name or a list index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GraphQlPathSegment {
    /// Field name
    Key(String),
    /// List index
    Index(i64),
}

/// One entry of the `errors` array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphQlError {
    /// Human readable message
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub message: String,
    /// Path of the failing field
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub path: Vec<GraphQlPathSegment>,
    /// Optional extension data
    #[serde(default)]
    pub extensions: Option<GraphQlErrorExtension>,
}

impl GraphQlError {
    /// Reference id from the extensions, when the server supplied a non-empty one.
    pub fn reference_id(&self) -> Option<&str> {
        self.extensions
            .as_ref()
            .and_then(|ext| ext.reference_id.as_deref())
            .filter(|id| !id.is_empty())
    }

    /// Error code from the extensions.
    pub fn code(&self) -> Option<&str> {
        self.extensions.as_ref().and_then(|ext| ext.code.as_deref())
    }
}

/// Response envelope: untyped data plus ordered errors
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GraphQlResponse {
    /// Payload of arbitrary shape
    #[serde(default)]
    pub data: Option<Value>,
    /// Errors, in server order
    #[serde(default, deserialize_with = "crate::api::graphql::null_as_default")]
    pub errors: Vec<GraphQlError>,
}
