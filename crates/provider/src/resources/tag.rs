//! Tag

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use contabo_common::{CreateTagRequest, Error, Result, TagResponse, UpdateTagRequest};

use crate::context::ProviderContext;
use crate::reconciler::{ChangeKind, ChangeSet, Resource};

pub struct TagResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    pub name: String,
    /// Hex color, e.g. `#0A78C3`
    pub color: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TagState {
    pub id: String,
    pub name: String,
    pub color: String,
}

impl From<TagResponse> for TagState {
    fn from(tag: TagResponse) -> Self {
        Self {
            id: tag.tag_id.to_string(),
            name: tag.name,
            color: tag.color,
        }
    }
}

pub(crate) fn parse_tag_id(id: &str) -> Result<i64> {
    id.parse::<i64>()
        .map_err(|_| Error::invalid_attribute("id", format!("{:?} is not a numeric tag id", id)))
}

#[async_trait]
impl Resource for TagResource {
    type Config = TagConfig;
    type State = TagState;

    fn type_name(&self) -> &'static str {
        "contabo_tag"
    }

    fn change_kind(&self, _field: &str) -> ChangeKind {
        ChangeKind::Metadata
    }

    fn validate(&self, config: &TagConfig) -> Result<()> {
        if config.name.is_empty() {
            return Err(Error::invalid_attribute("name", "must be set"));
        }
        Ok(())
    }

    async fn create(&self, ctx: &ProviderContext, config: &TagConfig) -> Result<String> {
        let request = CreateTagRequest {
            name: config.name.clone(),
            color: config.color.clone(),
        };
        let tag = ctx.api.create_tag(&request).await?;
        Ok(tag.tag_id.to_string())
    }

    async fn read(&self, ctx: &ProviderContext, id: &str, _config: Option<&TagConfig>) -> Result<TagState> {
        Ok(ctx.api.get_tag(parse_tag_id(id)?).await?.into())
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        id: &str,
        _prior: &TagConfig,
        desired: &TagConfig,
        changes: &ChangeSet,
    ) -> Result<()> {
        let request = UpdateTagRequest {
            name: changes.contains("name").then(|| desired.name.clone()),
            color: changes.contains("color").then(|| desired.color.clone()),
        };
        ctx.api.update_tag(parse_tag_id(id)?, &request).await?;
        Ok(())
    }

    async fn delete(&self, ctx: &ProviderContext, id: &str, _prior: &TagConfig) -> Result<()> {
        ctx.api.delete_tag(parse_tag_id(id)?).await
    }
}
