//! Contabo Provider Implementation
//!
//! Dispatches resource operations by type name and reports failures as
//! diagnostics.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use contabo_common::Error;

use crate::auth::{OAuth2Session, TokenCache};
use crate::client::ApiClient;
use crate::config::ProviderConfig;
use crate::context::ProviderContext;
use crate::reconciler::ManagedResource;
use crate::resources;
use crate::s3::AwsS3Connector;
use crate::state;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// User-facing report of a failed operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl From<&Error> for Diagnostic {
    fn from(err: &Error) -> Self {
        let summary = match err {
            Error::NoResponse(_) => "Unexpected API error, no http response",
            Error::Api { .. } => "API error",
            Error::NotFound { .. } => "Resource not found",
            Error::NoData(_) => "API response returned empty data",
            Error::MultipleDataObjects { .. } => "API response had multiple data objects",
            Error::ProvisioningFailed { kind, .. } if kind == "image" => {
                "Download error, check the url availability and retry"
            }
            Error::ProvisioningFailed { .. } => "Provisioning failed",
            Error::Timeout { .. } => "Timed out waiting for a terminal status",
            Error::Cancelled { .. } => "Operation cancelled",
            Error::ImmutableField { .. } => "Attribute cannot be updated",
            Error::InvalidCompositeId { .. } => "Invalid resource identifier",
            Error::InvalidConfig(_) | Error::Auth(_) => "Provider configuration error",
            Error::Credentials(_) => "Object storage credentials error",
            Error::InvalidBucketName(_) => "Invalid bucket name",
            Error::S3(_) => "S3 API error",
            Error::UnknownResourceType(_) => "Unknown resource type",
            Error::InvalidAttribute { .. } => "Invalid attribute value",
            Error::Io(_) | Error::Serialization(_) | Error::Url(_) => "Internal provider error",
        };
        let attribute = match err {
            Error::InvalidAttribute { attribute, .. } => Some(attribute.clone()),
            Error::ImmutableField { field, .. } => Some(field.clone()),
            _ => None,
        };
        Diagnostic {
            severity: Severity::Error,
            summary: summary.to_string(),
            detail: err.to_string(),
            attribute,
        }
    }
}

impl From<Error> for Diagnostic {
    fn from(err: Error) -> Self {
        Diagnostic::from(&err)
    }
}

/// Result of a read, apply or import
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResourceResponse {
    /// `None` when the resource does not exist (anymore)
    pub new_state: Option<Value>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ResourceResponse {
    fn state(new_state: Option<Value>) -> Self {
        Self {
            new_state,
            diagnostics: vec![],
        }
    }

    fn failed(err: Error) -> Self {
        error!("{}", err);
        Self {
            new_state: None,
            diagnostics: vec![err.into()],
        }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }
}

/// Contabo Provider
pub struct ContaboProvider {
    context: RwLock<Option<Arc<ProviderContext>>>,
    resources: HashMap<&'static str, Box<dyn ManagedResource>>,
    cancel: CancellationToken,
}

impl Default for ContaboProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ContaboProvider {
    pub fn new() -> Self {
        Self {
            context: RwLock::new(None),
            resources: resources::registry(),
            cancel: CancellationToken::new(),
        }
    }

    /// Provider that is already configured with `context`
    pub fn with_context(context: ProviderContext) -> Self {
        let cancel = context.cancel.clone();
        Self {
            context: RwLock::new(Some(Arc::new(context))),
            resources: resources::registry(),
            cancel,
        }
    }

    /// Supported resource type names, sorted
    pub fn resource_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.resources.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Log in and prepare the API clients
    pub async fn configure(&self, config: &ProviderConfig) -> Result<(), Diagnostic> {
        info!("Configuring provider for {}", config.api);
        let context = self.build_context(config).await.map_err(|e| {
            error!("Failed to configure provider: {}", e);
            Diagnostic::from(e)
        })?;
        info!("Authenticated as user {}", context.user_id);
        *self.context.write().await = Some(Arc::new(context));
        Ok(())
    }

    async fn build_context(&self, config: &ProviderConfig) -> contabo_common::Result<ProviderContext> {
        let credentials = config.credentials()?;
        let cache_path = match &config.token_cache_path {
            Some(path) => path.clone(),
            None => TokenCache::default_path()?,
        };
        let session = Arc::new(OAuth2Session::establish(credentials, TokenCache::new(cache_path)).await?);
        let user_id = session.user_id().await?;
        let api = ApiClient::new(&config.api, session)?;

        Ok(ProviderContext::new(api, user_id, Arc::new(AwsS3Connector))
            .with_poll_policy(config.poll_policy())
            .with_cancel_token(self.cancel.clone())
            .with_cancel_instance_on_destroy(config.cancel_instance_on_destroy))
    }

    /// Authenticated user id, once configured
    pub async fn user_id(&self) -> Option<String> {
        self.context.read().await.as_ref().map(|c| c.user_id.clone())
    }

    async fn context(&self) -> contabo_common::Result<Arc<ProviderContext>> {
        self.context
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::InvalidConfig("provider is not configured".to_string()))
    }

    fn resource(&self, type_name: &str) -> contabo_common::Result<&dyn ManagedResource> {
        self.resources
            .get(type_name)
            .map(|r| r.as_ref())
            .ok_or_else(|| Error::UnknownResourceType(type_name.to_string()))
    }

    /// Refresh `current_state`; a vanished resource yields no state
    pub async fn read_resource(&self, type_name: &str, current_state: &Value) -> ResourceResponse {
        info!("ReadResource called for {}", type_name);
        let result: contabo_common::Result<Option<Value>> = async {
            let resource = self.resource(type_name)?;
            let ctx = self.context().await?;
            resource.read(&ctx, current_state).await
        }
        .await;

        match result {
            Ok(state) => ResourceResponse::state(state),
            Err(e) => ResourceResponse::failed(e),
        }
    }

    /// Create, update or delete depending on which states are present
    pub async fn apply_resource_change(
        &self,
        type_name: &str,
        prior_state: Option<&Value>,
        planned_state: Option<&Value>,
    ) -> ResourceResponse {
        info!("ApplyResourceChange called for {}", type_name);
        let prior = prior_state.filter(|v| !state::is_absent(Some(v)));
        let planned = planned_state.filter(|v| !state::is_absent(Some(v)));

        let result: contabo_common::Result<Option<Value>> = async {
            let resource = self.resource(type_name)?;
            let ctx = self.context().await?;
            match (prior, planned) {
                (None, Some(planned)) => resource.create(&ctx, planned).await.map(Some),
                (Some(prior), None) => resource.delete(&ctx, prior).await.map(|_| None),
                (Some(prior), Some(planned)) => resource.update(&ctx, prior, planned).await.map(Some),
                (None, None) => {
                    debug!("Nothing to apply for {}", type_name);
                    Ok(None)
                }
            }
        }
        .await;

        match result {
            Ok(state) => ResourceResponse::state(state),
            Err(e) => ResourceResponse::failed(e),
        }
    }

    /// Read an existing remote resource into a new state
    pub async fn import_resource_state(&self, type_name: &str, id: &str) -> ResourceResponse {
        info!("ImportResourceState called for {} with ID {}", type_name, id);
        let result: contabo_common::Result<Value> = async {
            let resource = self.resource(type_name)?;
            let ctx = self.context().await?;
            resource.import(&ctx, id).await
        }
        .await;

        match result {
            Ok(state) => ResourceResponse::state(Some(state)),
            Err(e) => ResourceResponse::failed(e),
        }
    }

    /// Abort in-flight polling
    pub fn stop(&self) {
        info!("StopProvider called");
        self.cancel.cancel();
    }
}
