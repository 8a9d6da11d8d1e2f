use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;
use serde_json::Value;

use crate::api::{
    region::{POLICY_ENDPOINT, WAF_ENDPOINT},
    ApiError, ApiResult,
};

/// Path of the external authentication endpoint, relative to the gateway host
pub const AUTH_PATH: &str = "/auth/external";

const APP_ID_CLAIM: &str = "appId";
const WAF_APP_ID: &str = "64488de9-f813-42a7-93e7-f3fe25dd9011";
const POLICY_APP_ID: &str = "f47b536c-a990-42fb-9ab2-ec38f8c2dcff";

/// `data` member of the authentication response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponseData {
    /// Bearer token
    #[serde(default)]
    pub token: Option<String>,
    /// CSRF token (unused by API clients)
    #[serde(default)]
    pub csrf: Option<String>,
    /// Expiry timestamp as returned by the server
    #[serde(default)]
    pub expires: Option<String>,
    /// Seconds until expiry
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Authentication response envelope
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthResponse {
    /// Whether the gateway accepted the credentials
    #[serde(default)]
    pub success: Option<bool>,
    /// Token payload
    #[serde(default)]
    pub data: Option<AuthResponseData>,
}

impl AuthResponse {
    /// Extract the bearer token, failing when the envelope does not carry one.
    pub fn into_token(self) -> ApiResult<String> {
        self.data
            .and_then(|data| data.token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::authentication("missing token in authentication response"))
    }
}

/// Pick the GraphQL endpoint matching the application the token was issued for.
///
/// The token is decoded without verifying its signature; the gateway verifies it
/// on every call. Returns `None` when the token carries no recognised `appId`.
pub fn endpoint_for_token(token: &str) -> ApiResult<Option<&'static str>> {
    let claims = decode_claims(token)?;
    let endpoint = match claims.get(APP_ID_CLAIM).and_then(Value::as_str) {
        Some(WAF_APP_ID) => Some(WAF_ENDPOINT),
        Some(POLICY_APP_ID) => Some(POLICY_ENDPOINT),
        _ => None,
    };
    Ok(endpoint)
}

fn decode_claims(token: &str) -> ApiResult<Value> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| ApiError::authentication("failed to parse token: not a JWT"))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| ApiError::authentication(format!("failed to parse token: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::authentication(format!("failed to parse token claims: {e}")))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// Build an unsigned JWT carrying the given claims
    pub(crate) fn jwt_with_claims(claims: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.signature")
    }

    #[test]
    fn test_waf_token_selects_waf_endpoint() {
        let token = jwt_with_claims(&json!({"appId": WAF_APP_ID}));
        assert_eq!(endpoint_for_token(&token).expect("decode"), Some(WAF_ENDPOINT));
    }

    #[test]
    fn test_policy_token_selects_policy_endpoint() {
        let token = jwt_with_claims(&json!({"appId": POLICY_APP_ID, "sub": "x"}));
        assert_eq!(
            endpoint_for_token(&token).expect("decode"),
            Some(POLICY_ENDPOINT)
        );
    }

    #[test]
    fn test_unknown_app_id_keeps_endpoint() {
        let token = jwt_with_claims(&json!({"appId": "something-else"}));
        assert_eq!(endpoint_for_token(&token).expect("decode"), None);
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        let err = endpoint_for_token("not-a-jwt").expect_err("should fail");
        assert!(matches!(err, ApiError::Authentication { .. }));
    }

    #[test]
    fn test_missing_token_in_envelope() {
        let response: AuthResponse =
            serde_json::from_value(json!({"success": true, "data": {"csrf": "c"}}))
                .expect("parse");
        assert!(response.into_token().is_err());
    }

    #[test]
    fn test_token_extracted_from_envelope() {
        let response: AuthResponse = serde_json::from_value(json!({
            "success": true,
            "data": {"token": "t0k", "csrf": "c", "expires": "2026-01-01", "expiresIn": 1800}
        }))
        .expect("parse");
        assert_eq!(response.into_token().expect("token"), "t0k");
    }
}
