//! Custom image, downloaded by the remote side from a URL

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use contabo_common::types::non_empty;
use contabo_common::{CreateCustomImageRequest, Error, ImageResponse, Result, UpdateCustomImageRequest};

use crate::context::ProviderContext;
use crate::poll::wait_until_terminal;
use crate::reconciler::{ChangeKind, ChangeSet, Resource};

pub struct ImageResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub os_type: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImageState {
    pub id: String,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub os_type: String,
    pub version: String,
    pub uploaded_size_mb: f64,
    pub format: String,
    pub status: String,
    pub error_message: String,
    pub standard_image: bool,
    pub creation_date: String,
}

impl From<ImageResponse> for ImageState {
    fn from(image: ImageResponse) -> Self {
        Self {
            id: image.image_id,
            name: image.name,
            description: image.description,
            image_url: image.url,
            os_type: image.os_type,
            version: image.version,
            uploaded_size_mb: image.uploaded_size_mb,
            format: image.format,
            status: image.status.to_string(),
            error_message: image.error_message.unwrap_or_default(),
            standard_image: image.standard_image,
            creation_date: image.creation_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Resource for ImageResource {
    type Config = ImageConfig;
    type State = ImageState;

    fn type_name(&self) -> &'static str {
        "contabo_image"
    }

    fn change_kind(&self, field: &str) -> ChangeKind {
        match field {
            "name" | "description" => ChangeKind::Metadata,
            _ => ChangeKind::Immutable,
        }
    }

    fn validate(&self, config: &ImageConfig) -> Result<()> {
        for (attribute, value) in [
            ("name", &config.name),
            ("image_url", &config.image_url),
            ("os_type", &config.os_type),
            ("version", &config.version),
        ] {
            if value.is_empty() {
                return Err(Error::invalid_attribute(attribute, "must be set"));
            }
        }
        Ok(())
    }

    async fn create(&self, ctx: &ProviderContext, config: &ImageConfig) -> Result<String> {
        let request = CreateCustomImageRequest {
            name: config.name.clone(),
            description: non_empty(&config.description),
            url: config.image_url.clone(),
            os_type: config.os_type.clone(),
            version: config.version.clone(),
        };
        let image = ctx.api.create_image(&request).await?;
        Ok(image.image_id)
    }

    async fn read(&self, ctx: &ProviderContext, id: &str, _config: Option<&ImageConfig>) -> Result<ImageState> {
        let image = wait_until_terminal(
            ctx.poll,
            &ctx.cancel,
            "image",
            id,
            || ctx.api.get_image(id),
            |image| image.status.phase(image.error_message.as_deref()),
        )
        .await?;
        Ok(image.into())
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        id: &str,
        _prior: &ImageConfig,
        desired: &ImageConfig,
        changes: &ChangeSet,
    ) -> Result<()> {
        let request = UpdateCustomImageRequest {
            name: changes.contains("name").then(|| desired.name.clone()),
            description: changes
                .contains("description")
                .then(|| desired.description.clone()),
        };
        ctx.api.update_image(id, &request).await?;
        Ok(())
    }

    async fn delete(&self, ctx: &ProviderContext, id: &str, _prior: &ImageConfig) -> Result<()> {
        ctx.api.delete_image(id).await
    }
}
