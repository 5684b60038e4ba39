//! Object storage bucket
//!
//! Identified by `objectStorageId/bucketName`. Only public sharing can be
//! changed in place.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use contabo_common::{BucketId, Error, Result};

use crate::context::ProviderContext;
use crate::reconciler::{ChangeKind, ChangeSet, Resource};
use crate::s3::ObjectStorageSession;

pub struct BucketResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketConfig {
    pub name: String,
    pub object_storage_id: String,
    pub public_sharing: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BucketState {
    pub id: String,
    pub name: String,
    pub object_storage_id: String,
    pub s3_tenant_id: String,
    pub creation_date: String,
    pub public_sharing: bool,
    pub public_sharing_link: String,
}

/// The identifier is authoritative: key fields in the configuration must
/// agree with it.
fn check_key(kind: &str, key: &BucketId, config: &BucketConfig) -> Result<()> {
    if !config.name.is_empty() && config.name != key.name {
        return Err(Error::immutable(kind, "name"));
    }
    if !config.object_storage_id.is_empty() && config.object_storage_id != key.object_storage_id {
        return Err(Error::immutable(kind, "object_storage_id"));
    }
    Ok(())
}

#[async_trait]
impl Resource for BucketResource {
    type Config = BucketConfig;
    type State = BucketState;

    fn type_name(&self) -> &'static str {
        "contabo_object_storage_bucket"
    }

    fn change_kind(&self, field: &str) -> ChangeKind {
        match field {
            "public_sharing" => ChangeKind::Metadata,
            _ => ChangeKind::Immutable,
        }
    }

    fn validate(&self, config: &BucketConfig) -> Result<()> {
        BucketId::new(&config.object_storage_id, &config.name).encode()?;
        Ok(())
    }

    async fn create(&self, ctx: &ProviderContext, config: &BucketConfig) -> Result<String> {
        let id = BucketId::new(&config.object_storage_id, &config.name).encode()?;

        let session = ObjectStorageSession::open(ctx, &config.object_storage_id).await?;
        session.create_bucket(&config.name).await?;
        if config.public_sharing {
            if let Err(e) = session.enable_public_sharing(&config.name).await {
                warn!("Removing bucket {} after public sharing could not be enabled", id);
                if let Err(cleanup) = session.delete_bucket(&config.name).await {
                    error!("Bucket {} is left behind unmanaged: {}", id, cleanup);
                }
                return Err(e);
            }
        }
        Ok(id)
    }

    async fn read(&self, ctx: &ProviderContext, id: &str, _config: Option<&BucketConfig>) -> Result<BucketState> {
        let key: BucketId = id.parse()?;
        let session = ObjectStorageSession::open(ctx, &key.object_storage_id).await?;

        let bucket = session
            .find_bucket(&key.name)
            .await?
            .ok_or_else(|| Error::not_found("bucket", id))?;
        let public_sharing = session.is_public(&key.name).await?;
        let public_sharing_link = if public_sharing {
            session.public_sharing_link(&key.name)
        } else {
            String::new()
        };

        Ok(BucketState {
            id: id.to_string(),
            name: bucket.name,
            object_storage_id: key.object_storage_id,
            s3_tenant_id: session.object_storage().s3_tenant_id.clone(),
            creation_date: bucket.creation_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
            public_sharing,
            public_sharing_link,
        })
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        id: &str,
        _prior: &BucketConfig,
        desired: &BucketConfig,
        changes: &ChangeSet,
    ) -> Result<()> {
        let key: BucketId = id.parse()?;
        check_key(self.type_name(), &key, desired)?;

        if changes.contains("public_sharing") {
            let session = ObjectStorageSession::open(ctx, &key.object_storage_id).await?;
            if desired.public_sharing {
                session.enable_public_sharing(&key.name).await?;
            } else {
                session.disable_public_sharing(&key.name).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, ctx: &ProviderContext, id: &str, _prior: &BucketConfig) -> Result<()> {
        let key: BucketId = id.parse()?;
        let session = ObjectStorageSession::open(ctx, &key.object_storage_id).await?;
        session.delete_bucket(&key.name).await
    }
}
