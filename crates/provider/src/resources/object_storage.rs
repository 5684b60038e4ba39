//! Object storage
//!
//! Resized in place through the resize verb; destroying it cancels the
//! contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use contabo_common::{
    AutoScaling, AutoScalingRequest, CreateObjectStorageRequest, Error, ObjectStorageResponse, Result,
    UpgradeObjectStorageRequest,
};

use crate::context::ProviderContext;
use crate::reconciler::{ChangeKind, ChangeSet, Resource};

pub struct ObjectStorageResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoScalingConfig {
    /// `enabled` or `disabled`
    pub state: String,
    pub size_limit_tb: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStorageConfig {
    pub region: String,
    pub total_purchased_space_tb: f64,
    pub auto_scaling: Option<AutoScalingConfig>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ObjectStorageState {
    pub id: String,
    pub region: String,
    pub total_purchased_space_tb: f64,
    pub auto_scaling: Option<AutoScalingConfig>,
    pub auto_scaling_error_message: String,
    pub tenant_id: String,
    pub customer_id: String,
    pub data_center: String,
    pub s3_url: String,
    pub s3_tenant_id: String,
    pub status: String,
    pub created_date: String,
    pub cancel_date: String,
}

impl From<ObjectStorageResponse> for ObjectStorageState {
    fn from(storage: ObjectStorageResponse) -> Self {
        let error_message = storage
            .auto_scaling
            .as_ref()
            .and_then(|a| a.error_message.clone())
            .unwrap_or_default();
        Self {
            id: storage.object_storage_id,
            region: storage.region,
            total_purchased_space_tb: storage.total_purchased_space_tb,
            auto_scaling: storage.auto_scaling.map(|a: AutoScaling| AutoScalingConfig {
                state: a.state,
                size_limit_tb: a.size_limit_tb,
            }),
            auto_scaling_error_message: error_message,
            tenant_id: storage.tenant_id,
            customer_id: storage.customer_id,
            data_center: storage.data_center,
            s3_url: storage.s3_url,
            s3_tenant_id: storage.s3_tenant_id,
            status: storage.status,
            created_date: storage.created_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
            cancel_date: storage.cancel_date.unwrap_or_default(),
        }
    }
}

fn auto_scaling_request(config: &Option<AutoScalingConfig>) -> Option<AutoScalingRequest> {
    config.as_ref().map(|a| AutoScalingRequest {
        state: contabo_common::types::non_empty(&a.state),
        size_limit_tb: (a.size_limit_tb > 0.0).then_some(a.size_limit_tb),
    })
}

#[async_trait]
impl Resource for ObjectStorageResource {
    type Config = ObjectStorageConfig;
    type State = ObjectStorageState;

    fn type_name(&self) -> &'static str {
        "contabo_object_storage"
    }

    fn change_kind(&self, field: &str) -> ChangeKind {
        match field {
            "total_purchased_space_tb" | "auto_scaling" => ChangeKind::Reinstall,
            _ => ChangeKind::Immutable,
        }
    }

    fn validate(&self, config: &ObjectStorageConfig) -> Result<()> {
        if config.region.is_empty() {
            return Err(Error::invalid_attribute("region", "must be set"));
        }
        if config.total_purchased_space_tb <= 0.0 {
            return Err(Error::invalid_attribute(
                "total_purchased_space_tb",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    async fn create(&self, ctx: &ProviderContext, config: &ObjectStorageConfig) -> Result<String> {
        let request = CreateObjectStorageRequest {
            region: config.region.clone(),
            total_purchased_space_tb: config.total_purchased_space_tb,
            auto_scaling: auto_scaling_request(&config.auto_scaling),
        };
        let storage = ctx.api.create_object_storage(&request).await?;
        Ok(storage.object_storage_id)
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        id: &str,
        _config: Option<&ObjectStorageConfig>,
    ) -> Result<ObjectStorageState> {
        Ok(ctx.api.get_object_storage(id).await?.into())
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        id: &str,
        _prior: &ObjectStorageConfig,
        desired: &ObjectStorageConfig,
        changes: &ChangeSet,
    ) -> Result<()> {
        let request = UpgradeObjectStorageRequest {
            total_purchased_space_tb: changes
                .contains("total_purchased_space_tb")
                .then_some(desired.total_purchased_space_tb),
            auto_scaling: if changes.contains("auto_scaling") {
                auto_scaling_request(&desired.auto_scaling)
            } else {
                None
            },
        };
        ctx.api.resize_object_storage(id, &request).await?;
        info!("Resized object storage {}", id);
        Ok(())
    }

    async fn delete(&self, ctx: &ProviderContext, id: &str, _prior: &ObjectStorageConfig) -> Result<()> {
        ctx.api.cancel_object_storage(id).await?;
        info!("Cancelled object storage {}", id);
        Ok(())
    }
}
