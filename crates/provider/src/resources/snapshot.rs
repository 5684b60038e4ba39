//! Instance snapshot
//!
//! Snapshots are addressed under their instance. Imports take
//! `instanceId/snapshotId` since the owning instance is not otherwise known.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use contabo_common::ids::{self, BUCKET_ID_DELIMITER};
use contabo_common::types::non_empty;
use contabo_common::{CreateSnapshotRequest, Error, Result, SnapshotResponse, UpdateSnapshotRequest};

use super::instance::{parse_instance_id, wait_for_instance};
use crate::context::ProviderContext;
use crate::reconciler::{ChangeKind, ChangeSet, Resource};

pub struct SnapshotResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub name: String,
    pub description: String,
    pub instance_id: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SnapshotState {
    pub id: String,
    pub name: String,
    pub description: String,
    pub instance_id: i64,
    pub created_date: String,
    pub auto_delete_date: String,
    pub image_id: String,
    pub image_name: String,
}

impl From<SnapshotResponse> for SnapshotState {
    fn from(snapshot: SnapshotResponse) -> Self {
        Self {
            id: snapshot.snapshot_id,
            name: snapshot.name,
            description: snapshot.description,
            instance_id: snapshot.instance_id,
            created_date: snapshot.created_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
            auto_delete_date: snapshot
                .auto_delete_date
                .map(|d| d.to_rfc3339())
                .unwrap_or_default(),
            image_id: snapshot.image_id,
            image_name: snapshot.image_name,
        }
    }
}

/// Owning instance and snapshot id, from the configuration or an import id
fn locate(id: &str, config: Option<&SnapshotConfig>) -> Result<(i64, String)> {
    match config {
        Some(config) if config.instance_id != 0 => Ok((config.instance_id, id.to_string())),
        _ => {
            let parts = ids::decode(id, BUCKET_ID_DELIMITER, 2)?;
            Ok((parse_instance_id(&parts[0])?, parts[1].clone()))
        }
    }
}

#[async_trait]
impl Resource for SnapshotResource {
    type Config = SnapshotConfig;
    type State = SnapshotState;

    fn type_name(&self) -> &'static str {
        "contabo_instance_snapshot"
    }

    fn change_kind(&self, field: &str) -> ChangeKind {
        match field {
            "name" | "description" => ChangeKind::Metadata,
            _ => ChangeKind::Immutable,
        }
    }

    fn validate(&self, config: &SnapshotConfig) -> Result<()> {
        if config.name.is_empty() {
            return Err(Error::invalid_attribute("name", "must be set"));
        }
        if config.instance_id == 0 {
            return Err(Error::invalid_attribute("instance_id", "must be set"));
        }
        Ok(())
    }

    async fn create(&self, ctx: &ProviderContext, config: &SnapshotConfig) -> Result<String> {
        // The instance is busy while it is still being installed.
        wait_for_instance(ctx, config.instance_id).await?;

        let request = CreateSnapshotRequest {
            name: config.name.clone(),
            description: non_empty(&config.description),
        };
        let snapshot = ctx.api.create_snapshot(config.instance_id, &request).await?;
        Ok(snapshot.snapshot_id)
    }

    async fn read(&self, ctx: &ProviderContext, id: &str, config: Option<&SnapshotConfig>) -> Result<SnapshotState> {
        let (instance_id, snapshot_id) = locate(id, config)?;
        let mut state: SnapshotState = ctx.api.get_snapshot(instance_id, &snapshot_id).await?.into();
        if state.instance_id == 0 {
            state.instance_id = instance_id;
        }
        Ok(state)
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        id: &str,
        prior: &SnapshotConfig,
        desired: &SnapshotConfig,
        changes: &ChangeSet,
    ) -> Result<()> {
        let (instance_id, snapshot_id) = locate(id, Some(prior))?;
        let request = UpdateSnapshotRequest {
            name: changes.contains("name").then(|| desired.name.clone()),
            description: changes
                .contains("description")
                .then(|| desired.description.clone()),
        };
        ctx.api
            .update_snapshot(instance_id, &snapshot_id, &request)
            .await?;
        Ok(())
    }

    async fn delete(&self, ctx: &ProviderContext, id: &str, prior: &SnapshotConfig) -> Result<()> {
        let (instance_id, snapshot_id) = locate(id, Some(prior))?;
        ctx.api.delete_snapshot(instance_id, &snapshot_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_prefers_configured_instance() {
        let config = SnapshotConfig {
            instance_id: 7,
            ..Default::default()
        };
        assert_eq!(locate("snap-1", Some(&config)).unwrap(), (7, "snap-1".to_string()));
    }

    #[test]
    fn test_locate_import_id() {
        assert_eq!(locate("100/snap-1", None).unwrap(), (100, "snap-1".to_string()));
        assert!(locate("snap-1", None).is_err());
        assert!(locate("abc/snap-1", None).is_err());
    }
}
