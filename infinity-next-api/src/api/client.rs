//! Authenticated GraphQL session client.
//!
//! One [`Client`] is configured (host, endpoint, token) and then used for a
//! sequence of operations. Configuration happens through `&mut self` setters and
//! [`Client::authenticate`]; every GraphQL call takes `&self`, so a configured
//! client can be cloned into concurrent pollers without locking.

use std::time::Duration;

use log::{debug, info, trace, warn};
use reqwest::{
    header::{HeaderMap, CONTENT_TYPE},
    Response, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::api::{
    auth::{endpoint_for_token, AuthResponse, AUTH_PATH},
    graphql::{GraphQlError, GraphQlRequest, GraphQlResponse},
    region::Region,
    ApiError, ApiResult,
};

/// Header carrying the server side correlation id
pub const LOGGER_TOKEN_HEADER: &str = "Logger-Token";

const MISSING_REFERENCE_ID: &str = "not found in headers";
const MAX_BODY_LEN: usize = 4096;

/// Timeouts and rate-limit retry budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Timeout applied to every HTTP request
    pub request_timeout: Duration,
    /// Total attempts (including the first) while the server answers 429
    pub rate_limit_attempts: usize,
    /// Fixed wait between rate-limited attempts
    pub rate_limit_backoff: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            rate_limit_attempts: 3,
            rate_limit_backoff: Duration::from_secs(2),
        }
    }
}

/// Session against the Infinity Next GraphQL API
#[derive(Debug, Clone)]
pub struct Client {
    token: String,
    host: String,
    endpoint: String,
    http: reqwest::Client,
    config: ClientConfig,
}

impl Client {
    /// Create an unconfigured client with default timeouts.
    pub fn new() -> ApiResult<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create an unconfigured client with the given timeouts and retry budget.
    pub fn with_config(config: ClientConfig) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::transport("building HTTP client", e))?;

        Ok(Self {
            token: String::new(),
            host: String::new(),
            endpoint: String::new(),
            http,
            config,
        })
    }

    /// Create a client pointed at the host and default endpoint of `region`.
    pub fn for_region(region: Region, config: ClientConfig) -> ApiResult<Self> {
        let mut client = Self::with_config(config)?;
        client.set_host(region.host());
        client.set_endpoint(region.endpoint());
        Ok(client)
    }

    /// Set the bearer token (e.g. a pre-issued token, skipping authentication)
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = token.into();
    }

    /// Set the gateway host, e.g. `https://cloudinfra-gw.portal.checkpoint.com`
    pub fn set_host(&mut self, host: impl Into<String>) {
        self.host = host.into();
    }

    /// Set the GraphQL endpoint path
    pub fn set_endpoint(&mut self, endpoint: impl Into<String>) {
        self.endpoint = endpoint.into();
    }

    /// Current bearer token
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Current gateway host
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Current GraphQL endpoint path
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Exchange API credentials for a bearer token.
    ///
    /// On success the token is stored on the client and, when the token was
    /// issued for a known application, the GraphQL endpoint is switched to that
    /// application's endpoint.
    pub async fn authenticate(&mut self, client_id: &str, access_key: &str) -> ApiResult<()> {
        let url = self.url(AUTH_PATH)?;
        info!("Authenticating to {}", self.host);

        let response = self
            .http
            .post(url)
            .form(&[("clientId", client_id), ("accessKey", access_key)])
            .send()
            .await
            .map_err(|e| ApiError::transport("authentication", e))?;

        let status = response.status();
        let reference_id = reference_id_from_headers(response.headers());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::transport("reading authentication response", e))?;

        if !status.is_success() {
            return Err(ApiError::authentication(format!(
                "failed authenticating to Infinity Next with status {status}: {}",
                truncate_body(&bytes)
            )));
        }

        let envelope: AuthResponse = serde_json::from_slice(&bytes).map_err(|e| {
            ApiError::decode(
                "authentication response",
                truncate_body(&bytes),
                reference_id,
                e,
            )
        })?;

        let token = envelope.into_token()?;
        if let Some(endpoint) = endpoint_for_token(&token)? {
            debug!("Token issued for endpoint {endpoint}");
            self.endpoint = endpoint.to_string();
        }
        self.token = token;

        Ok(())
    }

    /// Run one GraphQL operation and return the value stored under `response_key`.
    ///
    /// HTTP 429 responses are retried after a fixed backoff until the attempt
    /// budget is spent, then reported as [`ApiError::RateLimited`]. Nothing else is
    /// retried.
    pub async fn execute(&self, request: &GraphQlRequest, response_key: &str) -> ApiResult<Value> {
        self.execute_with_reference(request, response_key)
            .await
            .map(|(value, _)| value)
    }

    /// [`Client::execute`] followed by a typed decode of the returned value.
    ///
    /// A decode failure carries the response's `Logger-Token` reference id.
    pub async fn execute_as<T: DeserializeOwned>(
        &self,
        request: &GraphQlRequest,
        response_key: &str,
    ) -> ApiResult<T> {
        let (value, reference_id) = self.execute_with_reference(request, response_key).await?;
        decode_value(value, response_key, &reference_id)
    }

    /// Run the request and return the value together with the header reference id
    async fn execute_with_reference(
        &self,
        request: &GraphQlRequest,
        response_key: &str,
    ) -> ApiResult<(Value, String)> {
        let body = serde_json::to_vec(request).map_err(|e| {
            ApiError::configuration(format!("failed to marshal GraphQL request: {e}"))
        })?;
        let url = self.url(&self.endpoint)?;
        let attempts = self.config.rate_limit_attempts.max(1);

        for attempt in 1..=attempts {
            trace!("GraphQL {response_key} attempt {attempt}/{attempts}");
            let response = self
                .http
                .post(url.clone())
                .header(CONTENT_TYPE, "application/json")
                .bearer_auth(&self.token)
                .body(body.clone())
                .send()
                .await
                .map_err(|e| ApiError::transport(response_key, e))?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                drop(response);
                if attempt < attempts {
                    warn!(
                        "GraphQL request {response_key} was rate limited, retrying in {:?}",
                        self.config.rate_limit_backoff
                    );
                    tokio::time::sleep(self.config.rate_limit_backoff).await;
                }
                continue;
            }

            return read_response(response, response_key).await;
        }

        Err(ApiError::RateLimited { attempts })
    }

    /// Append `path` to the host, keeping any path prefix the host carries.
    fn url(&self, path: &str) -> ApiResult<Url> {
        let mut url = Url::parse(&self.host)
            .map_err(|e| ApiError::configuration(format!("invalid host '{}': {e}", self.host)))?;
        if url.cannot_be_a_base() {
            return Err(ApiError::configuration(format!(
                "invalid host '{}': not a base URL",
                self.host
            )));
        }
        let joined = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
        Ok(url)
    }
}

/// Decode an untyped response value into `T`, naming the field on failure.
pub(crate) fn decode_value<T: DeserializeOwned>(
    value: Value,
    response_key: &str,
    reference_id: &str,
) -> ApiResult<T> {
    let rendered = value.to_string();
    serde_json::from_value(value).map_err(|e| {
        ApiError::decode(
            format!("{response_key} value"),
            truncate(&rendered),
            reference_id,
            e,
        )
    })
}

async fn read_response(response: Response, response_key: &str) -> ApiResult<(Value, String)> {
    let status = response.status();
    let reference_id = reference_id_from_headers(response.headers());
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::transport(format!("reading {response_key} response"), e))?;

    if status.is_success() {
        let envelope: GraphQlResponse = serde_json::from_slice(&bytes).map_err(|e| {
            ApiError::decode(
                format!("{response_key} response body"),
                truncate_body(&bytes),
                reference_id.clone(),
                e,
            )
        })?;
        let value = extract_field(envelope, response_key, &reference_id)?;
        return Ok((value, reference_id));
    }

    // Error statuses may still carry a GraphQL envelope explaining the failure
    if let Ok(envelope) = serde_json::from_slice::<GraphQlResponse>(&bytes) {
        if let Some(first) = envelope.errors.first() {
            return Err(graphql_error(first, &reference_id));
        }
    }

    Err(ApiError::HttpStatus {
        status,
        reference_id,
        body: truncate_body(&bytes),
    })
}

/// Apply the response rules: errors first, then missing key, then null.
pub(crate) fn extract_field(
    envelope: GraphQlResponse,
    response_key: &str,
    reference_id: &str,
) -> ApiResult<Value> {
    if let Some(first) = envelope.errors.first() {
        return Err(graphql_error(first, reference_id));
    }

    let mut data = match envelope.data {
        Some(Value::Object(map)) => map,
        other => {
            return Err(ApiError::MissingField {
                field: response_key.to_string(),
                data: other.map_or_else(|| "null".to_string(), |v| v.to_string()),
            })
        }
    };

    match data.remove(response_key) {
        None => Err(ApiError::MissingField {
            field: response_key.to_string(),
            data: truncate(&Value::Object(data).to_string()),
        }),
        Some(Value::Null) => Err(ApiError::NotFound {
            field: response_key.to_string(),
            reference_id: reference_id.to_string(),
        }),
        Some(value) => Ok(value),
    }
}

fn graphql_error(error: &GraphQlError, header_reference_id: &str) -> ApiError {
    ApiError::GraphQl {
        message: error.message.clone(),
        code: error.code().map(str::to_string),
        reference_id: error
            .reference_id()
            .unwrap_or(header_reference_id)
            .to_string(),
    }
}

fn reference_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get(LOGGER_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(MISSING_REFERENCE_ID)
        .to_string()
}

fn truncate_body(bytes: &[u8]) -> String {
    truncate(&String::from_utf8_lossy(bytes))
}

fn truncate(text: &str) -> String {
    if text.len() <= MAX_BODY_LEN {
        return text.to_string();
    }
    let mut end = MAX_BODY_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}
