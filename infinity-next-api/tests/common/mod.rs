#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use infinity_next_api::{Client, ClientConfig, PollSettings};
use serde_json::Value;
use wiremock::{
    matchers::{body_string_contains, method, path},
    Mock, MockServer, Request, Respond, ResponseTemplate,
};

pub const GRAPHQL_PATH: &str = "/app/i2/graphql/V1";

/// Short timeouts so retry tests stay fast
pub fn fast_config() -> ClientConfig {
    ClientConfig {
        request_timeout: Duration::from_secs(5),
        rate_limit_attempts: 3,
        rate_limit_backoff: Duration::from_millis(50),
    }
}

pub fn fast_poll() -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(10),
        timeout: Duration::from_secs(2),
    }
}

/// Client pointed at the mock server with a pre-issued token
pub fn client_for(server: &MockServer) -> Client {
    let mut client = Client::with_config(fast_config()).expect("client");
    client.set_host(server.uri());
    client.set_endpoint(GRAPHQL_PATH);
    client.set_token("test-token");
    client
}

pub fn jwt_with_claims(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

pub fn graphql_data(key: &str, value: Value) -> ResponseTemplate {
    let mut data = serde_json::Map::new();
    data.insert(key.to_string(), value);
    ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": data }))
}

/// Replays the given responses in order, repeating the last one
pub struct SequenceResponder {
    responses: Vec<ResponseTemplate>,
    counter: Arc<AtomicUsize>,
}

impl SequenceResponder {
    pub fn new(responses: Vec<ResponseTemplate>) -> (Self, Arc<AtomicUsize>) {
        let counter = Arc::new(AtomicUsize::new(0));
        (
            Self {
                responses,
                counter: counter.clone(),
            },
            counter,
        )
    }
}

impl Respond for SequenceResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let attempt = self.counter.fetch_add(1, Ordering::SeqCst);
        let index = attempt.min(self.responses.len() - 1);
        self.responses[index].clone()
    }
}

/// Mount a discard mock answering `result`
pub async fn mount_discard(server: &MockServer, result: Value) {
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_string_contains("discardChanges"))
        .respond_with(graphql_data("discardChanges", result))
        .mount(server)
        .await;
}
