//! Compute instance

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use contabo_common::types::non_empty;
use contabo_common::{
    AddOn, CreateInstanceRequest, Error, InstanceResponse, IpConfig, PatchInstanceRequest,
    ReinstallInstanceRequest, Result,
};

use crate::context::ProviderContext;
use crate::poll::wait_until_terminal;
use crate::reconciler::{ChangeKind, ChangeSet, Resource};

pub struct InstanceResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    pub display_name: String,
    pub image_id: String,
    pub region: String,
    pub product_id: String,
    pub ssh_keys: Vec<i64>,
    /// Secret id holding the root password
    pub root_password: i64,
    pub user_data: String,
    pub license: String,
    /// Contract period in months
    pub period: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InstanceState {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub image_id: String,
    pub region: String,
    pub data_center: String,
    pub product_id: String,
    pub product_type: String,
    pub ssh_keys: Vec<i64>,
    pub root_password: i64,
    pub user_data: String,
    pub license: String,
    pub period: i64,
    pub tenant_id: String,
    pub customer_id: String,
    pub ip_config: Option<IpConfig>,
    pub mac_address: String,
    pub ram_mb: f64,
    pub cpu_cores: i64,
    pub disk_mb: f64,
    pub os_type: String,
    pub default_user: String,
    pub created_date: String,
    pub cancel_date: String,
    pub status: String,
    pub error_message: String,
    pub v_host_id: i64,
    pub add_ons: Vec<AddOn>,
}

impl InstanceState {
    /// Write-only attributes are not returned by the API and are carried
    /// over from the configuration.
    fn from_response(instance: InstanceResponse, config: Option<&InstanceConfig>) -> Self {
        let config = config.cloned().unwrap_or_default();
        Self {
            id: instance.instance_id.to_string(),
            name: instance.name,
            display_name: instance.display_name,
            image_id: instance.image_id,
            region: instance.region,
            data_center: instance.data_center,
            product_id: instance.product_id,
            product_type: instance.product_type,
            ssh_keys: instance.ssh_keys,
            root_password: config.root_password,
            user_data: config.user_data,
            license: config.license,
            period: config.period,
            tenant_id: instance.tenant_id,
            customer_id: instance.customer_id,
            ip_config: instance.ip_config,
            mac_address: instance.mac_address,
            ram_mb: instance.ram_mb,
            cpu_cores: instance.cpu_cores,
            disk_mb: instance.disk_mb,
            os_type: instance.os_type,
            default_user: instance.default_user.unwrap_or_default(),
            created_date: instance.created_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
            cancel_date: instance.cancel_date.unwrap_or_default(),
            status: instance.status.to_string(),
            error_message: instance.error_message.unwrap_or_default(),
            v_host_id: instance.v_host_id,
            add_ons: instance.add_ons,
        }
    }
}

pub(crate) fn parse_instance_id(id: &str) -> Result<i64> {
    id.parse::<i64>()
        .map_err(|_| Error::invalid_attribute("id", format!("{:?} is not a numeric instance id", id)))
}

fn optional_list(values: &[i64]) -> Option<Vec<i64>> {
    if values.is_empty() {
        None
    } else {
        Some(values.to_vec())
    }
}

fn optional_number(value: i64) -> Option<i64> {
    (value != 0).then_some(value)
}

/// Fetch an instance until it leaves `provisioning`/`installing`
pub(crate) async fn wait_for_instance(ctx: &ProviderContext, instance_id: i64) -> Result<InstanceResponse> {
    wait_until_terminal(
        ctx.poll,
        &ctx.cancel,
        "instance",
        &instance_id.to_string(),
        || ctx.api.get_instance(instance_id),
        |instance| instance.status.phase(instance.error_message.as_deref()),
    )
    .await
}

#[async_trait]
impl Resource for InstanceResource {
    type Config = InstanceConfig;
    type State = InstanceState;

    fn type_name(&self) -> &'static str {
        "contabo_instance"
    }

    fn change_kind(&self, field: &str) -> ChangeKind {
        match field {
            "display_name" => ChangeKind::Metadata,
            "image_id" | "user_data" | "root_password" | "ssh_keys" => ChangeKind::Reinstall,
            _ => ChangeKind::Immutable,
        }
    }

    async fn create(&self, ctx: &ProviderContext, config: &InstanceConfig) -> Result<String> {
        let request = CreateInstanceRequest {
            image_id: non_empty(&config.image_id),
            product_id: non_empty(&config.product_id),
            region: non_empty(&config.region),
            ssh_keys: optional_list(&config.ssh_keys),
            root_password: optional_number(config.root_password),
            user_data: non_empty(&config.user_data),
            license: non_empty(&config.license),
            period: optional_number(config.period),
            display_name: non_empty(&config.display_name),
        };
        let created = ctx.api.create_instance(&request).await?;
        Ok(created.instance_id.to_string())
    }

    async fn read(&self, ctx: &ProviderContext, id: &str, config: Option<&InstanceConfig>) -> Result<InstanceState> {
        let instance = wait_for_instance(ctx, parse_instance_id(id)?).await?;
        Ok(InstanceState::from_response(instance, config))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        id: &str,
        prior: &InstanceConfig,
        desired: &InstanceConfig,
        changes: &ChangeSet,
    ) -> Result<()> {
        let instance_id = parse_instance_id(id)?;

        if changes.has_metadata() {
            let request = PatchInstanceRequest {
                display_name: non_empty(&desired.display_name),
            };
            ctx.api.patch_instance(instance_id, &request).await?;
            info!("Updated display name of instance {}", instance_id);
        }

        if changes.has_reinstall() {
            let image_id = non_empty(&desired.image_id)
                .or_else(|| non_empty(&prior.image_id))
                .ok_or_else(|| Error::invalid_attribute("image_id", "reinstalling requires an image"))?;
            let request = ReinstallInstanceRequest {
                image_id,
                ssh_keys: optional_list(&desired.ssh_keys),
                root_password: optional_number(desired.root_password),
                user_data: non_empty(&desired.user_data),
            };
            ctx.api.reinstall_instance(instance_id, &request).await?;
            info!("Reinstalling instance {}", instance_id);
        }

        Ok(())
    }

    async fn delete(&self, ctx: &ProviderContext, id: &str, _prior: &InstanceConfig) -> Result<()> {
        let instance_id = parse_instance_id(id)?;
        if ctx.cancel_instance_on_destroy {
            ctx.api.cancel_instance(instance_id).await?;
            info!("Cancelled instance {}", instance_id);
        } else {
            warn!(
                "Instance {} was removed from management but keeps running; cancel it manually or enable cancel_instance_on_destroy",
                instance_id
            );
        }
        Ok(())
    }
}
