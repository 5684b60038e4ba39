//! Tag assignment
//!
//! Identified by `tagId_resourceType_resourceId`. Every attribute is part
//! of the identifier, so nothing can be changed in place.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use contabo_common::{AssignmentResponse, Error, Result, TagAssignmentId};

use crate::context::ProviderContext;
use crate::reconciler::{ChangeKind, ChangeSet, Resource};

pub struct TagAssignmentResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagAssignmentConfig {
    pub tag_id: i64,
    pub resource_type: String,
    pub resource_id: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TagAssignmentState {
    pub id: String,
    pub tag_id: i64,
    pub tag_name: String,
    pub resource_type: String,
    pub resource_id: String,
    pub resource_name: String,
}

impl TagAssignmentState {
    fn from_response(id: String, assignment: AssignmentResponse) -> Self {
        Self {
            id,
            tag_id: assignment.tag_id,
            tag_name: assignment.tag_name,
            resource_type: assignment.resource_type,
            resource_id: assignment.resource_id,
            resource_name: assignment.resource_name,
        }
    }
}

#[async_trait]
impl Resource for TagAssignmentResource {
    type Config = TagAssignmentConfig;
    type State = TagAssignmentState;

    fn type_name(&self) -> &'static str {
        "contabo_tag_assignment"
    }

    fn change_kind(&self, _field: &str) -> ChangeKind {
        ChangeKind::Immutable
    }

    fn validate(&self, config: &TagAssignmentConfig) -> Result<()> {
        TagAssignmentId::new(config.tag_id, &config.resource_type, &config.resource_id).encode()?;
        Ok(())
    }

    async fn create(&self, ctx: &ProviderContext, config: &TagAssignmentConfig) -> Result<String> {
        // Encode first so an ambiguous id never reaches the remote side.
        let id = TagAssignmentId::new(config.tag_id, &config.resource_type, &config.resource_id).encode()?;
        ctx.api
            .create_assignment(config.tag_id, &config.resource_type, &config.resource_id)
            .await?;
        info!("Assigned tag {} to {} {}", config.tag_id, config.resource_type, config.resource_id);
        Ok(id)
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        id: &str,
        _config: Option<&TagAssignmentConfig>,
    ) -> Result<TagAssignmentState> {
        let key: TagAssignmentId = id.parse()?;
        let assignment = ctx
            .api
            .get_assignment(key.tag_id, &key.resource_type, &key.resource_id)
            .await?;
        Ok(TagAssignmentState::from_response(id.to_string(), assignment))
    }

    async fn update(
        &self,
        _ctx: &ProviderContext,
        _id: &str,
        _prior: &TagAssignmentConfig,
        _desired: &TagAssignmentConfig,
        _changes: &ChangeSet,
    ) -> Result<()> {
        Err(Error::immutable(self.type_name(), "tag_id"))
    }

    async fn delete(&self, ctx: &ProviderContext, id: &str, _prior: &TagAssignmentConfig) -> Result<()> {
        let key: TagAssignmentId = id.parse()?;
        ctx.api
            .delete_assignment(key.tag_id, &key.resource_type, &key.resource_id)
            .await
    }
}
