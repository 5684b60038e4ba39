//! Contabo REST client
//!
//! Thin typed wrapper over the v1 control-plane API. Every method issues
//! exactly one request; nothing is retried.

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use contabo_common::types::*;
use contabo_common::{Error, Result, TRACE_ID};

use crate::auth::AccessTokenSource;

pub const DEFAULT_API_URL: &str = "https://api.contabo.com";

/// Add-on that enables private networking on an instance
pub const PRIVATE_NETWORKING_ADDON: i64 = 1477;

/// Client for the Contabo control plane
#[derive(Clone)]
pub struct ApiClient {
    http_client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn AccessTokenSource>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient").field("base_url", &self.base_url).finish()
    }
}

impl ApiClient {
    pub fn new(base_url: &str, tokens: Arc<dyn AccessTokenSource>) -> Result<Self> {
        // Validate once so request URLs can be built by concatenation.
        Url::parse(base_url)?;
        Ok(Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = Url::parse(&format!("{}{}", self.base_url, path))?;
        let request_id = Uuid::new_v4().to_string();
        debug!(%method, %url, %request_id, "API request");

        let token = self.tokens.access_token().await?;
        Ok(self
            .http_client
            .request(method, url)
            .bearer_auth(token)
            .header("x-request-id", request_id)
            .header("x-trace-id", TRACE_ID))
    }

    async fn send(&self, builder: RequestBuilder, kind: &str, id: &str) -> Result<reqwest::Response> {
        let resp = builder
            .send()
            .await
            .map_err(|e| Error::NoResponse(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            let detail = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|parsed| parsed.message)
                .unwrap_or_else(|_| body.trim().to_string());
            return Err(Error::not_found(kind, id).with_detail(detail));
        }
        Err(api_error(status, &body))
    }

    async fn call<T: DeserializeOwned>(&self, builder: RequestBuilder, kind: &str, id: &str) -> Result<DataEnvelope<T>> {
        let resp = self.send(builder, kind, id).await?;
        let body = resp
            .text()
            .await
            .map_err(|e| Error::NoResponse(e.to_string()))?;
        if body.trim().is_empty() {
            return Ok(DataEnvelope { data: Vec::new() });
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn call_one<T: DeserializeOwned>(&self, builder: RequestBuilder, kind: &str, id: &str) -> Result<T> {
        self.call(builder, kind, id).await?.expect_one(kind)
    }

    async fn call_empty(&self, builder: RequestBuilder, kind: &str, id: &str) -> Result<()> {
        self.send(builder, kind, id).await?;
        Ok(())
    }

    async fn get_one<T: DeserializeOwned>(&self, path: &str, kind: &str, id: &str) -> Result<T> {
        let builder = self.request(Method::GET, path).await?;
        self.call_one(builder, kind, id).await
    }

    async fn send_one<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        kind: &str,
        id: &str,
    ) -> Result<T> {
        let builder = self.request(method, path).await?.json(body);
        self.call_one(builder, kind, id).await
    }

    async fn delete(&self, path: &str, kind: &str, id: &str) -> Result<()> {
        let builder = self.request(Method::DELETE, path).await?;
        self.call_empty(builder, kind, id).await
    }

    // Instances

    pub async fn create_instance(&self, request: &CreateInstanceRequest) -> Result<InstanceActionResponse> {
        self.send_one(Method::POST, "/v1/compute/instances", request, "instance", "")
            .await
    }

    pub async fn get_instance(&self, instance_id: i64) -> Result<InstanceResponse> {
        let id = instance_id.to_string();
        self.get_one(&format!("/v1/compute/instances/{}", id), "instance", &id)
            .await
    }

    pub async fn patch_instance(&self, instance_id: i64, request: &PatchInstanceRequest) -> Result<InstanceActionResponse> {
        let id = instance_id.to_string();
        self.send_one(Method::PATCH, &format!("/v1/compute/instances/{}", id), request, "instance", &id)
            .await
    }

    pub async fn reinstall_instance(
        &self,
        instance_id: i64,
        request: &ReinstallInstanceRequest,
    ) -> Result<InstanceActionResponse> {
        let id = instance_id.to_string();
        self.send_one(Method::PUT, &format!("/v1/compute/instances/{}", id), request, "instance", &id)
            .await
    }

    pub async fn upgrade_instance(&self, instance_id: i64, request: &UpgradeInstanceRequest) -> Result<()> {
        let id = instance_id.to_string();
        let builder = self
            .request(Method::POST, &format!("/v1/compute/instances/{}/upgrade", id))
            .await?
            .json(request);
        self.call_empty(builder, "instance", &id).await
    }

    pub async fn cancel_instance(&self, instance_id: i64) -> Result<()> {
        let id = instance_id.to_string();
        let builder = self
            .request(Method::POST, &format!("/v1/compute/instances/{}/cancel", id))
            .await?;
        self.call_empty(builder, "instance", &id).await
    }

    // Images

    pub async fn create_image(&self, request: &CreateCustomImageRequest) -> Result<ImageResponse> {
        self.send_one(Method::POST, "/v1/compute/images", request, "image", "")
            .await
    }

    pub async fn get_image(&self, image_id: &str) -> Result<ImageResponse> {
        self.get_one(&format!("/v1/compute/images/{}", image_id), "image", image_id)
            .await
    }

    pub async fn update_image(&self, image_id: &str, request: &UpdateCustomImageRequest) -> Result<ImageResponse> {
        self.send_one(Method::PATCH, &format!("/v1/compute/images/{}", image_id), request, "image", image_id)
            .await
    }

    pub async fn delete_image(&self, image_id: &str) -> Result<()> {
        self.delete(&format!("/v1/compute/images/{}", image_id), "image", image_id)
            .await
    }

    // Snapshots

    pub async fn create_snapshot(&self, instance_id: i64, request: &CreateSnapshotRequest) -> Result<SnapshotResponse> {
        self.send_one(
            Method::POST,
            &format!("/v1/compute/instances/{}/snapshots", instance_id),
            request,
            "snapshot",
            "",
        )
        .await
    }

    pub async fn get_snapshot(&self, instance_id: i64, snapshot_id: &str) -> Result<SnapshotResponse> {
        self.get_one(
            &format!("/v1/compute/instances/{}/snapshots/{}", instance_id, snapshot_id),
            "snapshot",
            snapshot_id,
        )
        .await
    }

    pub async fn update_snapshot(
        &self,
        instance_id: i64,
        snapshot_id: &str,
        request: &UpdateSnapshotRequest,
    ) -> Result<SnapshotResponse> {
        self.send_one(
            Method::PATCH,
            &format!("/v1/compute/instances/{}/snapshots/{}", instance_id, snapshot_id),
            request,
            "snapshot",
            snapshot_id,
        )
        .await
    }

    pub async fn delete_snapshot(&self, instance_id: i64, snapshot_id: &str) -> Result<()> {
        self.delete(
            &format!("/v1/compute/instances/{}/snapshots/{}", instance_id, snapshot_id),
            "snapshot",
            snapshot_id,
        )
        .await
    }

    // Object storages

    pub async fn create_object_storage(&self, request: &CreateObjectStorageRequest) -> Result<ObjectStorageResponse> {
        self.send_one(Method::POST, "/v1/object-storages", request, "object storage", "")
            .await
    }

    pub async fn get_object_storage(&self, object_storage_id: &str) -> Result<ObjectStorageResponse> {
        self.get_one(
            &format!("/v1/object-storages/{}", object_storage_id),
            "object storage",
            object_storage_id,
        )
        .await
    }

    pub async fn resize_object_storage(
        &self,
        object_storage_id: &str,
        request: &UpgradeObjectStorageRequest,
    ) -> Result<ObjectStorageResponse> {
        self.send_one(
            Method::POST,
            &format!("/v1/object-storages/{}/resize", object_storage_id),
            request,
            "object storage",
            object_storage_id,
        )
        .await
    }

    pub async fn cancel_object_storage(&self, object_storage_id: &str) -> Result<()> {
        let builder = self
            .request(Method::PATCH, &format!("/v1/object-storages/{}/cancel", object_storage_id))
            .await?;
        self.call_empty(builder, "object storage", object_storage_id).await
    }

    /// S3 credentials of `user_id` for one object storage
    pub async fn object_storage_credentials(
        &self,
        user_id: &str,
        object_storage_id: &str,
    ) -> Result<Vec<ObjectStorageCredentialResponse>> {
        let builder = self
            .request(Method::GET, &format!("/v1/users/{}/object-storages/credentials", user_id))
            .await?
            .query(&[("objectStorageId", object_storage_id)]);
        Ok(self.call(builder, "credentials", object_storage_id).await?.data)
    }

    // Secrets

    pub async fn create_secret(&self, request: &CreateSecretRequest) -> Result<SecretResponse> {
        self.send_one(Method::POST, "/v1/secrets", request, "secret", "").await
    }

    pub async fn get_secret(&self, secret_id: i64) -> Result<SecretResponse> {
        let id = secret_id.to_string();
        self.get_one(&format!("/v1/secrets/{}", id), "secret", &id).await
    }

    pub async fn update_secret(&self, secret_id: i64, request: &UpdateSecretRequest) -> Result<SecretResponse> {
        let id = secret_id.to_string();
        self.send_one(Method::PATCH, &format!("/v1/secrets/{}", id), request, "secret", &id)
            .await
    }

    pub async fn delete_secret(&self, secret_id: i64) -> Result<()> {
        let id = secret_id.to_string();
        self.delete(&format!("/v1/secrets/{}", id), "secret", &id).await
    }

    // Private networks

    pub async fn create_private_network(&self, request: &CreatePrivateNetworkRequest) -> Result<PrivateNetworkResponse> {
        self.send_one(Method::POST, "/v1/private-networks", request, "private network", "")
            .await
    }

    pub async fn get_private_network(&self, private_network_id: i64) -> Result<PrivateNetworkResponse> {
        let id = private_network_id.to_string();
        self.get_one(&format!("/v1/private-networks/{}", id), "private network", &id)
            .await
    }

    pub async fn patch_private_network(
        &self,
        private_network_id: i64,
        request: &PatchPrivateNetworkRequest,
    ) -> Result<PrivateNetworkResponse> {
        let id = private_network_id.to_string();
        self.send_one(Method::PATCH, &format!("/v1/private-networks/{}", id), request, "private network", &id)
            .await
    }

    pub async fn delete_private_network(&self, private_network_id: i64) -> Result<()> {
        let id = private_network_id.to_string();
        self.delete(&format!("/v1/private-networks/{}", id), "private network", &id)
            .await
    }

    pub async fn assign_instance(&self, private_network_id: i64, instance_id: i64) -> Result<()> {
        let id = private_network_id.to_string();
        let builder = self
            .request(
                Method::POST,
                &format!("/v1/private-networks/{}/instances/{}", id, instance_id),
            )
            .await?;
        self.call_empty(builder, "private network", &id).await
    }

    pub async fn unassign_instance(&self, private_network_id: i64, instance_id: i64) -> Result<()> {
        let id = private_network_id.to_string();
        self.delete(
            &format!("/v1/private-networks/{}/instances/{}", id, instance_id),
            "private network",
            &id,
        )
        .await
    }

    /// Add the private networking add-on to an instance.
    ///
    /// A 409 means the add-on is already present and is not an error.
    pub async fn enable_private_networking(&self, instance_id: i64) -> Result<()> {
        let request = UpgradeInstanceRequest {
            add_ons: vec![PRIVATE_NETWORKING_ADDON],
        };
        match self.upgrade_instance(instance_id, &request).await {
            Err(e) if e.is_conflict() => {
                debug!("Instance {} already has private networking", instance_id);
                Ok(())
            }
            other => other,
        }
    }

    // Tags

    pub async fn create_tag(&self, request: &CreateTagRequest) -> Result<TagResponse> {
        self.send_one(Method::POST, "/v1/tags", request, "tag", "").await
    }

    pub async fn get_tag(&self, tag_id: i64) -> Result<TagResponse> {
        let id = tag_id.to_string();
        self.get_one(&format!("/v1/tags/{}", id), "tag", &id).await
    }

    pub async fn update_tag(&self, tag_id: i64, request: &UpdateTagRequest) -> Result<TagResponse> {
        let id = tag_id.to_string();
        self.send_one(Method::PATCH, &format!("/v1/tags/{}", id), request, "tag", &id)
            .await
    }

    pub async fn delete_tag(&self, tag_id: i64) -> Result<()> {
        let id = tag_id.to_string();
        self.delete(&format!("/v1/tags/{}", id), "tag", &id).await
    }

    // Tag assignments

    pub async fn create_assignment(&self, tag_id: i64, resource_type: &str, resource_id: &str) -> Result<()> {
        let path = assignment_path(tag_id, resource_type, resource_id);
        let builder = self.request(Method::POST, &path).await?;
        self.call_empty(builder, "tag assignment", &path).await
    }

    pub async fn get_assignment(&self, tag_id: i64, resource_type: &str, resource_id: &str) -> Result<AssignmentResponse> {
        let path = assignment_path(tag_id, resource_type, resource_id);
        let id = format!("{}/{}/{}", tag_id, resource_type, resource_id);
        self.get_one(&path, "tag assignment", &id).await
    }

    pub async fn delete_assignment(&self, tag_id: i64, resource_type: &str, resource_id: &str) -> Result<()> {
        let path = assignment_path(tag_id, resource_type, resource_id);
        let id = format!("{}/{}/{}", tag_id, resource_type, resource_id);
        self.delete(&path, "tag assignment", &id).await
    }
}

fn assignment_path(tag_id: i64, resource_type: &str, resource_id: &str) -> String {
    format!("/v1/tags/{}/assignments/{}/{}", tag_id, resource_type, resource_id)
}

/// Build an error from a non-2xx response.
///
/// The structured `{statusCode, message}` body is preferred; when it does not
/// parse, the raw body is kept in the message.
fn api_error(status: StatusCode, body: &str) -> Error {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => Error::Api {
            status: parsed.status_code,
            message: parsed.message,
        },
        Err(e) => {
            warn!("Could not parse API error body: {}", e);
            Error::Api {
                status: status.as_u16(),
                message: format!("{}: {}", e, body),
            }
        }
    }
}
