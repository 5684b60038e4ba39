mod common;

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{context_with_s3, data, MemoryS3, USER_ID};
use contabo_common::Error;
use contabo_provider::reconciler::Reconciler;
use contabo_provider::resources::BucketResource;
use contabo_provider::s3::{public_read_policy, PRIVATE_POLICY};

async fn object_storage_api() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/object-storages/os-123"))
        .respond_with(data(json!({
            "objectStorageId": "os-123",
            "region": "EU",
            "s3Url": "https://eu2.contabostorage.com",
            "s3TenantId": "tenant1",
            "status": "READY"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/users/{}/object-storages/credentials", USER_ID)))
        .and(query_param("objectStorageId", "os-123"))
        .respond_with(data(json!({
            "objectStorageId": "os-123",
            "credentialId": 9,
            "accessKey": "AK",
            "secretKey": "SK"
        })))
        .mount(&server)
        .await;

    server
}

fn buckets() -> Reconciler<BucketResource> {
    Reconciler::new(BucketResource)
}

fn planned(public: bool) -> Value {
    json!({
        "name": "my-bucket",
        "object_storage_id": "os-123",
        "public_sharing": public
    })
}

#[tokio::test]
async fn create_public_bucket() {
    let server = object_storage_api().await;
    let s3 = MemoryS3::default();
    let ctx = context_with_s3(&server, s3.clone());

    let state = buckets().create(&ctx, &planned(true)).await.unwrap();

    assert_eq!(state["id"], "os-123/my-bucket");
    assert_eq!(state["public_sharing"], true);
    assert_eq!(
        state["public_sharing_link"],
        "https://eu2.contabostorage.com/tenant1:my-bucket"
    );
    assert_eq!(s3.policy("my-bucket"), Some(public_read_policy("my-bucket")));

    let connections = s3.state.lock().unwrap().connections.clone();
    assert!(connections
        .iter()
        .all(|(endpoint, key)| endpoint == "https://eu2.contabostorage.com" && key == "AK"));
}

#[tokio::test]
async fn failed_sharing_removes_new_bucket() {
    let server = object_storage_api().await;
    let s3 = MemoryS3::default().denying_policies();
    let ctx = context_with_s3(&server, s3.clone());

    let err = buckets().create(&ctx, &planned(true)).await.unwrap_err();
    assert!(matches!(err, Error::S3(ref message) if message.contains("AccessDenied")));
    assert!(!s3.has_bucket("my-bucket"));
}

#[tokio::test]
async fn private_bucket_has_no_link() {
    let server = object_storage_api().await;
    let s3 = MemoryS3::default();
    let ctx = context_with_s3(&server, s3.clone());

    let state = buckets().create(&ctx, &planned(false)).await.unwrap();
    assert_eq!(state["public_sharing"], false);
    assert_eq!(state["public_sharing_link"], "");
    assert!(s3.policy_puts().is_empty());
}

#[tokio::test]
async fn enabling_sharing_twice_writes_the_same_policy() {
    let server = object_storage_api().await;
    let s3 = MemoryS3::default().with_bucket("my-bucket");
    let ctx = context_with_s3(&server, s3.clone());

    let prior = json!({
        "id": "os-123/my-bucket",
        "name": "my-bucket",
        "object_storage_id": "os-123",
        "public_sharing": false
    });
    let mut desired = prior.clone();
    desired["public_sharing"] = json!(true);

    let first = buckets().update(&ctx, &prior, &desired).await.unwrap();
    let second = buckets().update(&ctx, &prior, &desired).await.unwrap();
    assert_eq!(first, second);

    let puts = s3.policy_puts();
    assert_eq!(puts.len(), 2);
    assert_eq!(puts[0], puts[1]);
}

#[tokio::test]
async fn disabling_sharing_applies_deny_all_policy() {
    let server = object_storage_api().await;
    let s3 = MemoryS3::default().with_bucket("my-bucket");
    let ctx = context_with_s3(&server, s3.clone());

    let mut prior = planned(true);
    prior["id"] = json!("os-123/my-bucket");
    let desired = {
        let mut d = prior.clone();
        d["public_sharing"] = json!(false);
        d
    };

    let state = buckets().update(&ctx, &prior, &desired).await.unwrap();
    assert_eq!(state["public_sharing"], false);
    assert_eq!(s3.policy("my-bucket").as_deref(), Some(PRIVATE_POLICY));
}

#[tokio::test]
async fn renaming_is_rejected() {
    let server = object_storage_api().await;
    let s3 = MemoryS3::default().with_bucket("my-bucket");
    let ctx = context_with_s3(&server, s3.clone());

    let mut prior = planned(false);
    prior["id"] = json!("os-123/my-bucket");
    let mut desired = prior.clone();
    desired["name"] = json!("renamed");

    let err = buckets().update(&ctx, &prior, &desired).await.unwrap_err();
    assert!(matches!(err, Error::ImmutableField { ref field, .. } if field == "name"));
    assert!(s3.has_bucket("my-bucket"));
    assert!(!s3.has_bucket("renamed"));
}

#[tokio::test]
async fn invalid_bucket_name_is_remapped() {
    let server = object_storage_api().await;
    let ctx = context_with_s3(&server, MemoryS3::default());

    let mut desired = planned(false);
    desired["name"] = json!("My_Bucket");

    let err = buckets().create(&ctx, &desired).await.unwrap_err();
    assert!(matches!(err, Error::InvalidBucketName(ref name) if name == "My_Bucket"));
    assert!(err.to_string().contains("bucket-naming-requirements"));
}

#[tokio::test]
async fn import_decodes_composite_id() {
    let server = object_storage_api().await;
    let s3 = MemoryS3::default().with_bucket("my-bucket");
    let ctx = context_with_s3(&server, s3);

    let state = buckets().import(&ctx, "os-123/my-bucket").await.unwrap();
    assert_eq!(state["name"], "my-bucket");
    assert_eq!(state["object_storage_id"], "os-123");
    assert_eq!(state["s3_tenant_id"], "tenant1");

    let err = buckets().import(&ctx, "my-bucket").await.unwrap_err();
    assert!(matches!(err, Error::InvalidCompositeId { .. }));
}

#[tokio::test]
async fn deleted_bucket_reads_as_none() {
    let server = object_storage_api().await;
    let s3 = MemoryS3::default().with_bucket("my-bucket");
    let ctx = context_with_s3(&server, s3.clone());

    let mut state = planned(false);
    state["id"] = json!("os-123/my-bucket");

    buckets().delete(&ctx, &state).await.unwrap();
    assert!(!s3.has_bucket("my-bucket"));
    assert!(buckets().read(&ctx, &state).await.unwrap().is_none());
}

#[tokio::test]
async fn missing_credentials_fail() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/object-storages/os-123"))
        .respond_with(data(json!({
            "objectStorageId": "os-123",
            "s3Url": "https://eu2.contabostorage.com",
            "s3TenantId": "tenant1"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/users/{}/object-storages/credentials", USER_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;

    let ctx = context_with_s3(&server, MemoryS3::default());
    let err = buckets().create(&ctx, &planned(false)).await.unwrap_err();
    assert!(matches!(err, Error::Credentials(_)));
}
