//! Wire models for the Contabo REST API
//!
//! Field names follow the API's camelCase JSON. Optional request fields are
//! skipped when unset so zero values are never sent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::status::{ImageStatus, InstanceStatus};

/// Response envelope shared by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> DataEnvelope<T> {
    /// Unwrap a single-object response.
    ///
    /// Anything other than exactly one element is an internal consistency
    /// error and no element is returned.
    pub fn expect_one(self, context: &str) -> Result<T> {
        let count = self.data.len();
        let mut data = self.data.into_iter();
        match (data.next(), count) {
            (None, _) => Err(Error::NoData(context.to_string())),
            (Some(item), 1) => Ok(item),
            (Some(_), count) => Err(Error::MultipleDataObjects {
                context: context.to_string(),
                count,
            }),
        }
    }
}

/// Structured error body returned on non-2xx responses
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    pub status_code: u16,
    pub message: String,
}

// Instances

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IpAddress {
    #[serde(default)]
    pub ip: String,
    #[serde(rename = "netmaskCidr", default)]
    pub netmask_cidr: i64,
    #[serde(default)]
    pub gateway: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IpConfig {
    #[serde(default)]
    pub v4: Option<IpAddress>,
    #[serde(default)]
    pub v6: Option<IpAddress>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AddOn {
    pub id: i64,
    #[serde(default)]
    pub quantity: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceResponse {
    pub instance_id: i64,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub data_center: String,
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub product_type: String,
    #[serde(default)]
    pub image_id: String,
    #[serde(default)]
    pub ip_config: Option<IpConfig>,
    #[serde(default)]
    pub mac_address: String,
    #[serde(default)]
    pub ram_mb: f64,
    #[serde(default)]
    pub cpu_cores: i64,
    #[serde(default)]
    pub disk_mb: f64,
    #[serde(default)]
    pub os_type: String,
    #[serde(default)]
    pub ssh_keys: Vec<i64>,
    #[serde(default)]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancel_date: Option<String>,
    #[serde(default)]
    pub status: InstanceStatus,
    #[serde(rename = "vHostId", default)]
    pub v_host_id: i64,
    #[serde(default)]
    pub add_ons: Vec<AddOn>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub default_user: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_keys: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_password: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatchInstanceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReinstallInstanceRequest {
    pub image_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_keys: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_password: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeInstanceRequest {
    pub add_ons: Vec<i64>,
}

/// Minimal acknowledgement returned by instance action endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceActionResponse {
    pub instance_id: i64,
    #[serde(default)]
    pub action: Option<String>,
}

// Images

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    pub image_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub uploaded_size_mb: f64,
    #[serde(default)]
    pub os_type: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub status: ImageStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub standard_image: bool,
    #[serde(default)]
    pub creation_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomImageRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub url: String,
    pub os_type: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomImageRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// Snapshots

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResponse {
    pub snapshot_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instance_id: i64,
    #[serde(default)]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auto_delete_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub image_id: String,
    #[serde(default)]
    pub image_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateSnapshotRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSnapshotRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// Object storages

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AutoScaling {
    #[serde(default)]
    pub state: String,
    #[serde(rename = "sizeLimitTB", default)]
    pub size_limit_tb: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectStorageResponse {
    pub object_storage_id: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancel_date: Option<String>,
    #[serde(default)]
    pub auto_scaling: Option<AutoScaling>,
    #[serde(default)]
    pub data_center: String,
    #[serde(rename = "totalPurchasedSpaceTB", default)]
    pub total_purchased_space_tb: f64,
    #[serde(default)]
    pub s3_url: String,
    #[serde(default)]
    pub s3_tenant_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub region: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AutoScalingRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(rename = "sizeLimitTB", skip_serializing_if = "Option::is_none")]
    pub size_limit_tb: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateObjectStorageRequest {
    pub region: String,
    #[serde(rename = "totalPurchasedSpaceTB")]
    pub total_purchased_space_tb: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_scaling: Option<AutoScalingRequest>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeObjectStorageRequest {
    #[serde(rename = "totalPurchasedSpaceTB", skip_serializing_if = "Option::is_none")]
    pub total_purchased_space_tb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_scaling: Option<AutoScalingRequest>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectStorageCredentialResponse {
    #[serde(default)]
    pub object_storage_id: String,
    #[serde(default)]
    pub credential_id: i64,
    pub access_key: String,
    pub secret_key: String,
}

// Secrets

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretResponse {
    pub secret_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(rename = "type", default)]
    pub secret_type: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateSecretRequest {
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub secret_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSecretRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

// Private networks

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateNetworkInstance {
    pub instance_id: i64,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateNetworkResponse {
    pub private_network_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub region_name: String,
    #[serde(default)]
    pub data_center: String,
    #[serde(default)]
    pub cidr: String,
    #[serde(default)]
    pub available_ips: i64,
    #[serde(default)]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub instances: Vec<PrivateNetworkInstance>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreatePrivateNetworkRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatchPrivateNetworkRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// Tags

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagResponse {
    pub tag_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateTagRequest {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTagRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResponse {
    pub tag_id: i64,
    #[serde(default)]
    pub tag_name: String,
    pub resource_type: String,
    pub resource_id: String,
    #[serde(default)]
    pub resource_name: String,
}

/// Returns `Some(s)` unless `s` is empty.
///
/// Zero-valued attributes are treated as unset and never sent.
pub fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expect_one_cardinality() {
        let one: DataEnvelope<TagResponse> =
            serde_json::from_value(json!({ "data": [{ "tagId": 1, "name": "a", "color": "#fff" }] }))
                .unwrap();
        assert_eq!(one.expect_one("tag").unwrap().tag_id, 1);

        let none: DataEnvelope<TagResponse> = serde_json::from_value(json!({ "data": [] })).unwrap();
        assert!(matches!(none.expect_one("tag"), Err(Error::NoData(_))));

        let missing: DataEnvelope<TagResponse> = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(missing.expect_one("tag"), Err(Error::NoData(_))));

        let two: DataEnvelope<TagResponse> = serde_json::from_value(json!({
            "data": [{ "tagId": 1 }, { "tagId": 2 }]
        }))
        .unwrap();
        assert!(matches!(
            two.expect_one("tag"),
            Err(Error::MultipleDataObjects { count: 2, .. })
        ));
    }

    #[test]
    fn test_create_instance_request_skips_unset_fields() {
        let request = CreateInstanceRequest {
            image_id: Some("IMG1".to_string()),
            display_name: non_empty(""),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&request).unwrap(), json!({ "imageId": "IMG1" }));
    }

    #[test]
    fn test_instance_response_tolerates_sparse_payload() {
        let instance: InstanceResponse = serde_json::from_value(json!({
            "instanceId": 100,
            "displayName": "x",
            "status": "installing",
            "vHostId": 7,
            "ipConfig": { "v4": { "ip": "1.2.3.4", "netmaskCidr": 24, "gateway": "1.2.3.1" } }
        }))
        .unwrap();
        assert_eq!(instance.instance_id, 100);
        assert_eq!(instance.status, InstanceStatus::Installing);
        assert_eq!(instance.v_host_id, 7);
        assert!(instance.ssh_keys.is_empty());
    }
}
