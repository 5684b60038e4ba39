mod common;

use serde_json::json;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{context, data, instance, TOKEN};
use contabo_common::Error;
use contabo_provider::reconciler::Reconciler;
use contabo_provider::resources::InstanceResource;

fn instances() -> Reconciler<InstanceResource> {
    Reconciler::new(InstanceResource)
}

fn prior_state() -> serde_json::Value {
    json!({
        "id": "100",
        "display_name": "web",
        "image_id": "ubuntu-22",
        "region": "EU",
        "product_id": "V45",
        "ssh_keys": [1],
        "status": "running"
    })
}

#[tokio::test]
async fn create_polls_until_running() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/compute/instances"))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .and(header("x-trace-id", "contabo_terraform_provider"))
        .and(header_exists("x-request-id"))
        .and(body_json(json!({
            "imageId": "ubuntu-22",
            "productId": "V45",
            "region": "EU",
            "sshKeys": [1],
            "displayName": "web"
        })))
        .respond_with(data(json!({ "instanceId": 100 })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/compute/instances/100"))
        .respond_with(data(instance(100, "installing")))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/compute/instances/100"))
        .respond_with(data(instance(100, "running")))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context(&server);
    let state = instances()
        .create(
            &ctx,
            &json!({
                "display_name": "web",
                "image_id": "ubuntu-22",
                "region": "EU",
                "product_id": "V45",
                "ssh_keys": [1],
                "user_data": ""
            }),
        )
        .await
        .unwrap();

    assert_eq!(state["id"], "100");
    assert_eq!(state["status"], "running");
    assert_eq!(state["display_name"], "web");
    assert_eq!(state["image_id"], "ubuntu-22");
    assert_eq!(state["ssh_keys"], json!([1]));
}

#[tokio::test]
async fn display_name_change_patches_without_reinstall() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/v1/compute/instances/100"))
        .and(body_json(json!({ "displayName": "api" })))
        .respond_with(data(json!({ "instanceId": 100 })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/v1/compute/instances/100"))
        .respond_with(data(json!({ "instanceId": 100 })))
        .expect(0)
        .mount(&server)
        .await;

    let mut updated = instance(100, "running");
    updated["displayName"] = json!("api");
    Mock::given(method("GET"))
        .and(path("/v1/compute/instances/100"))
        .respond_with(data(updated))
        .mount(&server)
        .await;

    let mut planned = prior_state();
    planned["display_name"] = json!("api");

    let state = instances()
        .update(&context(&server), &prior_state(), &planned)
        .await
        .unwrap();
    assert_eq!(state["display_name"], "api");
}

#[tokio::test]
async fn image_change_reinstalls_then_polls() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v1/compute/instances/100"))
        .and(body_json(json!({ "imageId": "debian-12", "sshKeys": [1] })))
        .respond_with(data(json!({ "instanceId": 100 })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/v1/compute/instances/100"))
        .respond_with(data(json!({ "instanceId": 100 })))
        .expect(0)
        .mount(&server)
        .await;

    let mut installing = instance(100, "installing");
    installing["imageId"] = json!("debian-12");
    Mock::given(method("GET"))
        .and(path("/v1/compute/instances/100"))
        .respond_with(data(installing))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    let mut running = instance(100, "running");
    running["imageId"] = json!("debian-12");
    Mock::given(method("GET"))
        .and(path("/v1/compute/instances/100"))
        .respond_with(data(running))
        .expect(1)
        .mount(&server)
        .await;

    let mut planned = prior_state();
    planned["image_id"] = json!("debian-12");

    let state = instances()
        .update(&context(&server), &prior_state(), &planned)
        .await
        .unwrap();
    assert_eq!(state["image_id"], "debian-12");
    assert_eq!(state["status"], "running");
}

#[tokio::test]
async fn clearing_ssh_keys_reinstalls() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v1/compute/instances/100"))
        .and(body_json(json!({ "imageId": "ubuntu-22" })))
        .respond_with(data(json!({ "instanceId": 100 })))
        .expect(1)
        .mount(&server)
        .await;

    let mut running = instance(100, "running");
    running["sshKeys"] = json!([]);
    Mock::given(method("GET"))
        .and(path("/v1/compute/instances/100"))
        .respond_with(data(running))
        .expect(1)
        .mount(&server)
        .await;

    let mut planned = prior_state();
    planned["ssh_keys"] = json!([]);

    let state = instances()
        .update(&context(&server), &prior_state(), &planned)
        .await
        .unwrap();
    assert_eq!(state["ssh_keys"], json!([]));
}

#[tokio::test]
async fn metadata_and_reinstall_patch_first() {
    let server = MockServer::start().await;

    for verb in ["PATCH", "PUT"] {
        Mock::given(method(verb))
            .and(path("/v1/compute/instances/100"))
            .respond_with(data(json!({ "instanceId": 100 })))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/v1/compute/instances/100"))
        .respond_with(data(instance(100, "running")))
        .expect(1)
        .mount(&server)
        .await;

    let mut planned = prior_state();
    planned["display_name"] = json!("api");
    planned["user_data"] = json!("#cloud-config");

    instances()
        .update(&context(&server), &prior_state(), &planned)
        .await
        .unwrap();

    let verbs: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.method.to_string())
        .collect();
    assert_eq!(verbs, vec!["PATCH", "PUT", "GET"]);
}

#[tokio::test]
async fn immutable_change_fails_before_any_request() {
    let server = MockServer::start().await;

    let mut planned = prior_state();
    planned["region"] = json!("US-central");

    let err = instances()
        .update(&context(&server), &prior_state(), &planned)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ImmutableField { ref field, .. } if field == "region"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn unchanged_config_makes_no_requests() {
    let server = MockServer::start().await;
    let state = instances()
        .update(&context(&server), &prior_state(), &prior_state())
        .await
        .unwrap();
    assert_eq!(state, prior_state());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn error_status_is_provisioning_failure() {
    let server = MockServer::start().await;

    let mut failed = instance(100, "error");
    failed["errorMessage"] = json!("no capacity");
    Mock::given(method("GET"))
        .and(path("/v1/compute/instances/100"))
        .respond_with(data(failed))
        .mount(&server)
        .await;

    let err = instances()
        .read(&context(&server), &prior_state())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ProvisioningFailed { ref message, .. } if message == "no capacity"));
}

#[tokio::test]
async fn polling_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/compute/instances/100"))
        .respond_with(data(instance(100, "provisioning")))
        .expect(20)
        .mount(&server)
        .await;

    let err = instances()
        .read(&context(&server), &prior_state())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout { attempts: 20, .. }));
}

#[tokio::test]
async fn multiple_data_objects_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/compute/instances/100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [instance(100, "running"), instance(101, "running")]
        })))
        .mount(&server)
        .await;

    let err = instances()
        .read(&context(&server), &prior_state())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MultipleDataObjects { count: 2, .. }));
}

#[tokio::test]
async fn vanished_instance_reads_as_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/compute/instances/100"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "statusCode": 404,
            "message": "Entry Instances not found by instanceId 100"
        })))
        .mount(&server)
        .await;

    let state = instances()
        .read(&context(&server), &prior_state())
        .await
        .unwrap();
    assert!(state.is_none());
}

#[tokio::test]
async fn missing_instance_keeps_api_message() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/compute/instances/100"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "statusCode": 404,
            "message": "Entry Instances not found by instanceId 100"
        })))
        .mount(&server)
        .await;

    let err = instances().import(&context(&server), "100").await.unwrap_err();
    match &err {
        Error::NotFound { id, message, .. } => {
            assert_eq!(id, "100");
            assert_eq!(message, "Entry Instances not found by instanceId 100");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.to_string().ends_with("details: Entry Instances not found by instanceId 100"));
}

#[tokio::test]
async fn api_errors_carry_status_and_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/compute/instances"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "statusCode": 400,
            "message": "productId must be one of V45, V47"
        })))
        .mount(&server)
        .await;

    let err = instances()
        .create(&context(&server), &json!({ "product_id": "X1" }))
        .await
        .unwrap_err();
    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "productId must be one of V45, V47");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn delete_leaves_instance_by_default() {
    let server = MockServer::start().await;

    instances()
        .delete(&context(&server), &prior_state())
        .await
        .unwrap();
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_cancels_when_enabled() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/compute/instances/100/cancel"))
        .respond_with(data(json!({ "instanceId": 100 })))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context(&server).with_cancel_instance_on_destroy(true);
    instances().delete(&ctx, &prior_state()).await.unwrap();
}
