mod common;

use infinity_next_api::{
    resources::{
        docker_profile::{self, DockerProfileResource},
        publish_enforce::{PublishEnforceResource, SINGLETON_ID},
        trusted_sources::{self, TrustedSourcesResource},
    },
    InextError, Resource, ResourceState,
};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use wiremock::{
    matchers::{body_partial_json, body_string_contains, method, path},
    Mock, MockServer, ResponseTemplate,
};

use common::{client_for, fast_poll, graphql_data, mount_discard, GRAPHQL_PATH};

fn values(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

fn docker_profile_response() -> Value {
    json!({
        "id": "prof-1",
        "name": "docker",
        "profileType": "Docker",
        "authentication": {"token": "agent-token", "maxNumberOfAgents": 5},
        "additionalSettings": [{"id": "s-1", "key": "mode", "value": "prevent"}],
        "onlyDefinedApplications": false
    })
}

#[tokio::test]
async fn test_docker_profile_create_writes_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_string_contains("newDockerProfile"))
        .and(body_partial_json(json!({
            "variables": {"profileInput": {
                "name": "docker",
                "additionalSettings": [{"key": "mode", "value": "prevent"}],
                "authentication": {"maxNumberOfAgents": 5}
            }}
        })))
        .respond_with(graphql_data("newDockerProfile", docker_profile_response()))
        .expect(1)
        .mount(&server)
        .await;

    let mut state = ResourceState::from_values(values(json!({
        "name": "docker",
        "max_number_of_agents": 5,
        "additional_settings": {"mode": "prevent"}
    })));
    DockerProfileResource
        .create(&client_for(&server), &mut state)
        .await
        .expect("create");

    assert_eq!(state.id(), "prof-1");
    assert_eq!(
        state
            .require_str(docker_profile::AUTHENTICATION_TOKEN)
            .expect("token"),
        "agent-token"
    );
    assert_eq!(
        state
            .get_string_list(docker_profile::ADDITIONAL_SETTINGS_IDS)
            .expect("ids"),
        vec!["mode;;;s-1"]
    );
}

#[tokio::test]
async fn test_failed_create_discards_staged_changes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_string_contains("newDockerProfile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{"message": "name already exists"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_string_contains("discardChanges"))
        .respond_with(graphql_data("discardChanges", json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    let mut state = ResourceState::from_values(values(json!({"name": "docker"})));
    let err = DockerProfileResource
        .create(&client_for(&server), &mut state)
        .await
        .expect_err("create fails");

    assert!(err.to_string().contains("name already exists"));
    assert!(!state.exists());
}

#[tokio::test]
async fn test_failed_discard_is_reported_with_original_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_string_contains("deleteProfile"))
        .respond_with(graphql_data("deleteProfile", json!(false)))
        .mount(&server)
        .await;
    mount_discard(&server, json!(false)).await;

    let mut state = ResourceState::default();
    state.set_id("prof-1");
    let err = DockerProfileResource
        .delete(&client_for(&server), &mut state)
        .await
        .expect_err("delete rejected");

    assert!(matches!(err, InextError::WithDiscardFailure { .. }));
    assert!(err.to_string().contains("deleteProfile"));
    assert!(err.to_string().contains("failed to discard changes"));
    assert_eq!(state.id(), "prof-1");
}

#[tokio::test]
async fn test_read_of_missing_object_clears_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_string_contains("getDockerProfile"))
        .respond_with(graphql_data("getDockerProfile", Value::Null))
        .mount(&server)
        .await;

    let mut state = ResourceState::default();
    state.set_id("gone");
    DockerProfileResource
        .read(&client_for(&server), &mut state)
        .await
        .expect("not found is not an error");
    assert!(!state.exists());
}

#[tokio::test]
async fn test_docker_profile_update_sends_settings_diff_and_rereads() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_string_contains("updateDockerProfile"))
        .and(body_partial_json(json!({
            "variables": {
                "id": "prof-1",
                "profileInput": {
                    "updateAdditionalSettings": [{"id": "s-1", "key": "mode", "value": "detect"}]
                }
            }
        })))
        .respond_with(graphql_data("updateDockerProfile", json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    let mut updated = docker_profile_response();
    updated["additionalSettings"][0]["value"] = json!("detect");
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_string_contains("getDockerProfile"))
        .respond_with(graphql_data("getDockerProfile", updated))
        .mount(&server)
        .await;

    let mut state = ResourceState::default();
    docker_profile::write_to_state(
        serde_json::from_value(docker_profile_response()).expect("profile"),
        &mut state,
    );
    let mut planned = state.values().clone();
    planned.insert(
        docker_profile::ADDITIONAL_SETTINGS.to_string(),
        json!({"mode": "detect"}),
    );
    state.plan(planned);

    DockerProfileResource
        .update(&client_for(&server), &mut state)
        .await
        .expect("update");

    assert_eq!(
        state
            .get_string_map(docker_profile::ADDITIONAL_SETTINGS)
            .expect("settings")["mode"],
        "detect"
    );
    assert!(!state.has_change(docker_profile::ADDITIONAL_SETTINGS));
}

#[tokio::test]
async fn test_trusted_sources_create_defaults_visibility() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_string_contains("newTrustedSourceBehavior"))
        .and(body_partial_json(json!({
            "variables": {
                "ownerId": null,
                "practiceId": null,
                "behaviorInput": {"name": "trusted", "visibility": "Shared", "numOfSources": 2}
            }
        })))
        .respond_with(graphql_data(
            "newTrustedSourceBehavior",
            json!({
                "id": "beh-1",
                "name": "trusted",
                "visibility": "Shared",
                "behaviorType": "TrustedSources",
                "numOfSources": 2,
                "sourcesIdentifiers": [{"id": "src-1", "source": "10.0.0.1"}]
            }),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let mut state = ResourceState::from_values(values(json!({
        "name": "trusted",
        "min_num_of_sources": 2,
        "sources_identifiers": ["10.0.0.1"]
    })));
    TrustedSourcesResource
        .create(&client_for(&server), &mut state)
        .await
        .expect("create");

    assert_eq!(state.id(), "beh-1");
    assert_eq!(
        state
            .get_string_list(trusted_sources::SOURCES_IDENTIFIERS_IDS)
            .expect("ids"),
        vec!["10.0.0.1;;;src-1"]
    );
}

#[tokio::test]
async fn test_publish_enforce_resource_runs_both_tasks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_string_contains("asyncPublishChanges"))
        .respond_with(graphql_data("asyncPublishChanges", json!("pub-1")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_string_contains("enforcePolicy(profilesIds"))
        .respond_with(graphql_data("enforcePolicy", json!({"id": "enf-1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_string_contains("getTask"))
        .respond_with(graphql_data(
            "getTask",
            json!({"id": "any", "status": "Succeeded"}),
        ))
        .expect(2)
        .mount(&server)
        .await;

    let mut state = ResourceState::from_values(values(json!({
        "publish": true,
        "enforce": true,
        "profile_ids": ["prof-1"]
    })));
    PublishEnforceResource::new(CancellationToken::new())
        .with_poll_settings(fast_poll())
        .create(&client_for(&server), &mut state)
        .await
        .expect("trigger");

    assert_eq!(state.id(), SINGLETON_ID);
}

#[tokio::test]
async fn test_publish_enforce_resource_reports_enforce_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_string_contains("enforcePolicy"))
        .respond_with(graphql_data("enforcePolicy", json!({"id": "enf-1"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_string_contains("getTask"))
        .respond_with(graphql_data("getTask", json!({"id": "enf-1", "status": "Failed"})))
        .mount(&server)
        .await;

    let mut state = ResourceState::from_values(values(json!({"enforce": true})));
    let err = PublishEnforceResource::new(CancellationToken::new())
        .with_poll_settings(fast_poll())
        .update(&client_for(&server), &mut state)
        .await
        .expect_err("enforce failed");

    assert_eq!(err.to_string(), "enforce policy task enf-1 failed");
}

#[test]
fn test_resource_type_names() {
    let resources: Vec<Box<dyn Resource>> = vec![
        Box::new(DockerProfileResource),
        Box::new(TrustedSourcesResource),
        Box::new(PublishEnforceResource::new(CancellationToken::new())),
    ];
    let names: Vec<&str> = resources.iter().map(|r| r.type_name()).collect();
    assert_eq!(
        names,
        vec![
            "inext_docker_profile",
            "inext_trusted_sources",
            "inext_publish_enforce"
        ]
    );
}
