//! Private network and its instance memberships

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use contabo_common::types::non_empty;
use contabo_common::{CreatePrivateNetworkRequest, Error, PatchPrivateNetworkRequest, PrivateNetworkResponse, Result};

use crate::context::ProviderContext;
use crate::reconciler::{ChangeKind, ChangeSet, Resource};

pub struct PrivateNetworkResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivateNetworkConfig {
    pub name: String,
    pub description: String,
    pub region: String,
    pub instance_ids: BTreeSet<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PrivateNetworkState {
    pub id: String,
    pub name: String,
    pub description: String,
    pub region: String,
    pub region_name: String,
    pub data_center: String,
    pub cidr: String,
    pub available_ips: i64,
    pub created_date: String,
    pub instance_ids: BTreeSet<i64>,
}

impl From<PrivateNetworkResponse> for PrivateNetworkState {
    fn from(network: PrivateNetworkResponse) -> Self {
        Self {
            id: network.private_network_id.to_string(),
            name: network.name,
            description: network.description,
            region: network.region,
            region_name: network.region_name,
            data_center: network.data_center,
            cidr: network.cidr,
            available_ips: network.available_ips,
            created_date: network.created_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
            instance_ids: network.instances.iter().map(|i| i.instance_id).collect(),
        }
    }
}

fn parse_network_id(id: &str) -> Result<i64> {
    id.parse::<i64>()
        .map_err(|_| Error::invalid_attribute("id", format!("{:?} is not a numeric private network id", id)))
}

async fn assign(ctx: &ProviderContext, network_id: i64, instance_id: i64) -> Result<()> {
    ctx.api.enable_private_networking(instance_id).await?;
    ctx.api.assign_instance(network_id, instance_id).await?;
    info!("Assigned instance {} to private network {}", instance_id, network_id);
    Ok(())
}

async fn unassign(ctx: &ProviderContext, network_id: i64, instance_id: i64) -> Result<()> {
    match ctx.api.unassign_instance(network_id, instance_id).await {
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e),
        Ok(()) => {
            info!("Unassigned instance {} from private network {}", instance_id, network_id);
            Ok(())
        }
    }
}

#[async_trait]
impl Resource for PrivateNetworkResource {
    type Config = PrivateNetworkConfig;
    type State = PrivateNetworkState;

    fn type_name(&self) -> &'static str {
        "contabo_private_network"
    }

    fn change_kind(&self, field: &str) -> ChangeKind {
        match field {
            "name" | "description" | "instance_ids" => ChangeKind::Metadata,
            _ => ChangeKind::Immutable,
        }
    }

    fn validate(&self, config: &PrivateNetworkConfig) -> Result<()> {
        if config.name.is_empty() {
            return Err(Error::invalid_attribute("name", "must be set"));
        }
        Ok(())
    }

    async fn create(&self, ctx: &ProviderContext, config: &PrivateNetworkConfig) -> Result<String> {
        let request = CreatePrivateNetworkRequest {
            name: config.name.clone(),
            description: non_empty(&config.description),
            region: non_empty(&config.region),
        };
        let network = ctx.api.create_private_network(&request).await?;
        let network_id = network.private_network_id;

        for &instance_id in &config.instance_ids {
            assign(ctx, network_id, instance_id).await?;
        }
        Ok(network_id.to_string())
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        id: &str,
        _config: Option<&PrivateNetworkConfig>,
    ) -> Result<PrivateNetworkState> {
        Ok(ctx.api.get_private_network(parse_network_id(id)?).await?.into())
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        id: &str,
        prior: &PrivateNetworkConfig,
        desired: &PrivateNetworkConfig,
        changes: &ChangeSet,
    ) -> Result<()> {
        let network_id = parse_network_id(id)?;

        if changes.contains("name") || changes.contains("description") {
            let request = PatchPrivateNetworkRequest {
                name: changes.contains("name").then(|| desired.name.clone()),
                description: changes
                    .contains("description")
                    .then(|| desired.description.clone()),
            };
            ctx.api.patch_private_network(network_id, &request).await?;
        }

        if changes.contains("instance_ids") {
            for &instance_id in prior.instance_ids.difference(&desired.instance_ids) {
                unassign(ctx, network_id, instance_id).await?;
            }
            for &instance_id in desired.instance_ids.difference(&prior.instance_ids) {
                assign(ctx, network_id, instance_id).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, ctx: &ProviderContext, id: &str, _prior: &PrivateNetworkConfig) -> Result<()> {
        let network_id = parse_network_id(id)?;
        let network = ctx.api.get_private_network(network_id).await?;
        for instance in &network.instances {
            unassign(ctx, network_id, instance.instance_id).await?;
        }
        ctx.api.delete_private_network(network_id).await
    }
}
