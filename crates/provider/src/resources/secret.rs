//! Secret (password or SSH key)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use contabo_common::{CreateSecretRequest, Error, Result, SecretResponse, UpdateSecretRequest};

use crate::context::ProviderContext;
use crate::reconciler::{ChangeKind, ChangeSet, Resource};

pub struct SecretResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretConfig {
    pub name: String,
    pub value: String,
    /// `password` or `ssh`
    #[serde(rename = "type")]
    pub secret_type: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SecretState {
    pub id: String,
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub secret_type: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<SecretResponse> for SecretState {
    fn from(secret: SecretResponse) -> Self {
        Self {
            id: secret.secret_id.to_string(),
            name: secret.name,
            value: secret.value,
            secret_type: secret.secret_type,
            created_at: secret.created_at.map(|d| d.to_rfc3339()).unwrap_or_default(),
            updated_at: secret.updated_at.map(|d| d.to_rfc3339()).unwrap_or_default(),
        }
    }
}

fn parse_secret_id(id: &str) -> Result<i64> {
    id.parse::<i64>()
        .map_err(|_| Error::invalid_attribute("id", format!("{:?} is not a numeric secret id", id)))
}

#[async_trait]
impl Resource for SecretResource {
    type Config = SecretConfig;
    type State = SecretState;

    fn type_name(&self) -> &'static str {
        "contabo_secret"
    }

    fn change_kind(&self, field: &str) -> ChangeKind {
        match field {
            "name" | "value" => ChangeKind::Metadata,
            _ => ChangeKind::Immutable,
        }
    }

    fn validate(&self, config: &SecretConfig) -> Result<()> {
        match config.secret_type.as_str() {
            "password" | "ssh" => Ok(()),
            other => Err(Error::invalid_attribute(
                "type",
                format!("expected \"password\" or \"ssh\", got {:?}", other),
            )),
        }
    }

    async fn create(&self, ctx: &ProviderContext, config: &SecretConfig) -> Result<String> {
        let request = CreateSecretRequest {
            name: config.name.clone(),
            value: config.value.clone(),
            secret_type: config.secret_type.clone(),
        };
        let secret = ctx.api.create_secret(&request).await?;
        Ok(secret.secret_id.to_string())
    }

    async fn read(&self, ctx: &ProviderContext, id: &str, _config: Option<&SecretConfig>) -> Result<SecretState> {
        Ok(ctx.api.get_secret(parse_secret_id(id)?).await?.into())
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        id: &str,
        _prior: &SecretConfig,
        desired: &SecretConfig,
        changes: &ChangeSet,
    ) -> Result<()> {
        let request = UpdateSecretRequest {
            name: changes.contains("name").then(|| desired.name.clone()),
            value: changes.contains("value").then(|| desired.value.clone()),
        };
        ctx.api.update_secret(parse_secret_id(id)?, &request).await?;
        Ok(())
    }

    async fn delete(&self, ctx: &ProviderContext, id: &str, _prior: &SecretConfig) -> Result<()> {
        ctx.api.delete_secret(parse_secret_id(id)?).await
    }
}
