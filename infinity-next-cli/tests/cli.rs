use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::{
    matchers::{body_string_contains, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const GRAPHQL_PATH: &str = "/app/i2/graphql/V1";

/// JWT with an `appId` claim no endpoint is registered for
const UNKNOWN_APP_TOKEN: &str = "eyJhbGciOiJub25lIn0.eyJhcHBJZCI6IngifQ.sig";

/// `inext` isolated from the caller's environment and home directory
fn inext(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("inext").expect("binary");
    for var in [
        "INEXT_CLIENT_ID",
        "INEXT_ACCESS_KEY",
        "INEXT_REGION",
        "INEXT_TOKEN",
        "INEXT_HOST",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("HOME", home.path());
    cmd
}

fn graphql_data(key: &str, value: Value) -> ResponseTemplate {
    let mut data = serde_json::Map::new();
    data.insert(key.to_string(), value);
    ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
}

async fn mount(server: &MockServer, operation: &str, value: Value) {
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_string_contains(operation))
        .respond_with(graphql_data(operation, value))
        .mount(server)
        .await;
}

#[test]
fn test_help_lists_commands() {
    let home = tempfile::tempdir().expect("home");
    inext(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Infinity Next API Command Line Interface"))
        .stdout(predicate::str::contains("publish"))
        .stdout(predicate::str::contains("enforce"));
}

#[test]
fn test_invalid_region_fails() {
    let home = tempfile::tempdir().expect("home");
    inext(&home)
        .args(["publish", "--token", "t", "--region", "mars"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid region mars"));
}

#[test]
fn test_missing_credentials_fail() {
    let home = tempfile::tempdir().expect("home");
    inext(&home)
        .args(["discard"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing client id"));
}

#[test]
fn test_unreadable_explicit_config_fails() {
    let home = tempfile::tempdir().expect("home");
    let missing = home.path().join("nope.yaml");
    inext(&home)
        .args(["publish", "--token", "t", "--config"])
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read config file"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_publish_with_token_from_config_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(header("authorization", "Bearer file-token"))
        .and(body_string_contains("publishChanges"))
        .respond_with(graphql_data(
            "publishChanges",
            json!({"isValid": true, "errors": [], "warnings": []}),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let home = tempfile::tempdir().expect("home");
    std::fs::write(home.path().join(".inext.yaml"), "token: file-token\n").expect("config");

    inext(&home)
        .args(["publish", "--host", &server.uri()])
        .assert()
        .success()
        .stdout("Successfully published changes\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_publish_reports_warnings_and_errors() {
    let server = MockServer::start().await;
    mount(
        &server,
        "publishChanges",
        json!({"isValid": true, "errors": [], "warnings": [{"message": "w1"}, {"message": "w2"}]}),
    )
    .await;

    let home = tempfile::tempdir().expect("home");
    inext(&home)
        .args(["publish", "--token", "t", "--host", &server.uri()])
        .assert()
        .success()
        .stdout(predicate::str::contains("published changes with warnings: w1, w2"));

    let server = MockServer::start().await;
    mount(
        &server,
        "publishChanges",
        json!({"isValid": false, "errors": [{"message": "bad rule"}], "warnings": []}),
    )
    .await;
    inext(&home)
        .args(["publish", "--token", "t", "--host", &server.uri()])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "failed publishing changes with errors: bad rule",
        ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_discard_authenticates_with_credentials_from_env() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/external"))
        .and(body_string_contains("clientId=env-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"token": UNKNOWN_APP_TOKEN}
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount(&server, "discardChanges", json!(true)).await;

    let home = tempfile::tempdir().expect("home");
    inext(&home)
        .env("INEXT_CLIENT_ID", "env-id")
        .env("INEXT_ACCESS_KEY", "env-key")
        .env("INEXT_HOST", server.uri())
        .arg("discard")
        .assert()
        .success()
        .stdout("Successfully discarded changes\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_discard_rejected_fails() {
    let server = MockServer::start().await;
    mount(&server, "discardChanges", json!(false)).await;

    let home = tempfile::tempdir().expect("home");
    inext(&home)
        .args(["discard", "--token", "t", "--host", &server.uri()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to discard changes"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_auth_failure_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/external"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let home = tempfile::tempdir().expect("home");
    inext(&home)
        .args(["enforce", "-c", "id", "-k", "key", "--host", &server.uri()])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "failed authenticating to Infinity Next with status 403",
        ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_enforce_waits_for_task() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_string_contains(r#"profilesIds: [\"p-1\"]"#))
        .respond_with(graphql_data("enforcePolicy", json!({"id": "task-7"})))
        .expect(1)
        .mount(&server)
        .await;
    mount(&server, "getTask", json!({"id": "task-7", "status": "Succeeded"})).await;

    let home = tempfile::tempdir().expect("home");
    inext(&home)
        .args([
            "enforce",
            "--token",
            "t",
            "--profile-id",
            "p-1",
            "--host",
            &server.uri(),
        ])
        .assert()
        .success()
        .stdout("Enforce policy task task-7 succeeded\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_enforce_failed_task_fails() {
    let server = MockServer::start().await;
    mount(&server, "enforcePolicy", json!({"id": "task-8"})).await;
    mount(&server, "getTask", json!({"id": "task-8", "status": "Failed"})).await;

    let home = tempfile::tempdir().expect("home");
    inext(&home)
        .args(["enforce", "--token", "t", "--host", &server.uri()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("enforce policy task task-8 failed"));
}
