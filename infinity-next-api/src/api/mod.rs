//! Infinity Next GraphQL API: session client, authentication and wire shapes.

/// authentication against the Infinity Portal gateway
pub mod auth;

/// authenticated GraphQL session client
pub mod client;

/// GraphQL request/response envelopes
pub mod graphql;

/// gateway regions
pub mod region;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors produced by a single GraphQL or authentication round trip.
///
/// Every variant is fatal for the call that produced it. `NotFound` is the one
/// "soft" failure: the requested field was present but null, which resource
/// callers treat as absence of the object rather than as a broken call.
#[derive(Error, Debug)]
pub enum ApiError {
    /// DNS, connect, TLS or timeout failure. Never retried.
    #[error("transport error during {operation}: {source}")]
    Transport {
        /// What the client was doing (e.g. "authentication", "getTask")
        operation: String,
        /// The underlying reqwest error
        #[source]
        source: reqwest::Error,
    },

    /// The server kept answering 429 for the whole retry budget
    #[error("rate limited by server, gave up after {attempts} attempts")]
    RateLimited {
        /// Number of attempts performed
        attempts: usize,
    },

    /// A 200 response carrying a non-empty `errors` array
    #[error("GraphQL response contains errors: {message}, ReferenceID: {reference_id}")]
    GraphQl {
        /// Message of the first error
        message: String,
        /// Machine readable code from the error extensions, if any
        code: Option<String>,
        /// Correlation id from the error extensions or the `Logger-Token` header
        reference_id: String,
    },

    /// The requested top-level key is absent from `data`
    #[error("invalid response field: {field} is missing from response data {data}")]
    MissingField {
        /// The response key that was requested
        field: String,
        /// Rendered response data for diagnostics
        data: String,
    },

    /// The requested top-level key is present but null
    #[error("{field} not found - ReferenceID: {reference_id}")]
    NotFound {
        /// The response key that was requested
        field: String,
        /// Correlation id from the `Logger-Token` header
        reference_id: String,
    },

    /// Any non-2xx status other than 429
    #[error("non-OK http code ({status}) - ReferenceID: {reference_id} - Body: {body}")]
    HttpStatus {
        /// The HTTP status returned
        status: StatusCode,
        /// Correlation id from the `Logger-Token` header
        reference_id: String,
        /// Response body, truncated
        body: String,
    },

    /// Body could not be decoded into the expected shape
    #[error("failed to decode {context}. Body: {body}. ReferenceID: {reference_id}: {source}")]
    Decode {
        /// What was being decoded
        context: String,
        /// Raw body (truncated) kept for diagnostics
        body: String,
        /// Correlation id from the `Logger-Token` header
        reference_id: String,
        /// The underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Authentication failed for a reason other than transport
    #[error("authentication failed: {message}")]
    Authentication {
        /// Detailed error message
        message: String,
    },

    /// Client misconfiguration (bad host URL, unserializable variables)
    #[error("client configuration error: {message}")]
    Configuration {
        /// Detailed error message
        message: String,
    },
}

impl ApiError {
    /// Returns `true` when the requested object does not exist on the server.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` when the retry budget was consumed by 429 responses.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    pub(crate) fn transport(operation: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            operation: operation.into(),
            source,
        }
    }

    pub(crate) fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn decode(
        context: impl Into<String>,
        body: impl Into<String>,
        reference_id: impl Into<String>,
        source: serde_json::Error,
    ) -> Self {
        Self::Decode {
            context: context.into(),
            body: body.into(),
            reference_id: reference_id.into(),
            source,
        }
    }
}

/// Type of API Result extending Result
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_distinguished_from_missing_field() {
        let not_found = ApiError::NotFound {
            field: "getDockerProfile".to_string(),
            reference_id: "ref-1".to_string(),
        };
        let missing = ApiError::MissingField {
            field: "getDockerProfile".to_string(),
            data: "{}".to_string(),
        };

        assert!(not_found.is_not_found());
        assert!(!missing.is_not_found());
        assert!(not_found.to_string().contains("ref-1"));
        assert!(missing.to_string().contains("getDockerProfile"));
    }

    #[test]
    fn test_graphql_error_display_carries_reference_id() {
        let error = ApiError::GraphQl {
            message: "object is used by other objects".to_string(),
            code: Some("ERR_POINTED".to_string()),
            reference_id: "abc-123".to_string(),
        };

        let rendered = error.to_string();
        assert!(rendered.contains("object is used by other objects"));
        assert!(rendered.contains("abc-123"));
    }
}
