//! Generic resource reconciler
//!
//! Each remote resource type supplies a [`Resource`] strategy: how to
//! create, read, update and delete it, and how each configurable attribute
//! may change. [`Reconciler`] drives the strategy from attribute documents,
//! computes the [`ChangeSet`] between prior and desired configuration and
//! refuses changes the remote side cannot apply in place.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use contabo_common::{Error, Result};

use crate::context::ProviderContext;
use crate::state::{self, is_unset};

/// How a configurable attribute can be changed on an existing resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Lightweight patch, the resource stays as it is
    Metadata,
    /// Destructive in-place operation (reinstall, resize) that keeps the id
    Reinstall,
    /// Cannot be changed, the resource must be recreated
    Immutable,
}

/// Strategy for one remote resource type
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    /// Desired configuration, deserialized from the planned attributes
    type Config: Serialize + DeserializeOwned + Send + Sync;
    /// Observed state, serialized into the attributes handed back
    type State: Serialize + Send + Sync;

    /// Resource type name
    fn type_name(&self) -> &'static str;

    /// Classify a configurable attribute
    fn change_kind(&self, field: &str) -> ChangeKind;

    /// Reject configurations the remote side would refuse
    fn validate(&self, _config: &Self::Config) -> Result<()> {
        Ok(())
    }

    /// Create the resource and return its (possibly composite) id
    async fn create(&self, ctx: &ProviderContext, config: &Self::Config) -> Result<String>;

    /// Read the resource, waiting for a terminal status where the type
    /// provisions asynchronously. `config` carries write-only attributes
    /// the remote side does not return.
    async fn read(&self, ctx: &ProviderContext, id: &str, config: Option<&Self::Config>) -> Result<Self::State>;

    /// Apply `changes`, none of which are immutable
    async fn update(
        &self,
        ctx: &ProviderContext,
        id: &str,
        prior: &Self::Config,
        desired: &Self::Config,
        changes: &ChangeSet,
    ) -> Result<()>;

    /// Delete the resource
    async fn delete(&self, ctx: &ProviderContext, id: &str, prior: &Self::Config) -> Result<()>;
}

/// Attributes whose desired value differs from the prior one, by kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub metadata: BTreeSet<String>,
    pub reinstall: BTreeSet<String>,
    pub immutable: BTreeSet<String>,
}

impl ChangeSet {
    /// Compare two configurations attribute by attribute.
    ///
    /// Unset scalar values (null, empty string, zero) are left to the remote
    /// side and never count as a change. Emptying a list that was set does.
    pub fn between<R: Resource + ?Sized>(resource: &R, prior: &R::Config, desired: &R::Config) -> Result<Self> {
        let prior = serde_json::to_value(prior)?;
        let desired = serde_json::to_value(desired)?;

        let mut changes = ChangeSet::default();
        let Value::Object(desired) = desired else {
            return Ok(changes);
        };

        for (field, wanted) in &desired {
            let current = prior.get(field).unwrap_or(&Value::Null);
            if current == wanted {
                continue;
            }
            let cleared = wanted.is_array() && !is_unset(current);
            if is_unset(wanted) && !cleared {
                continue;
            }
            let bucket = match resource.change_kind(field) {
                ChangeKind::Metadata => &mut changes.metadata,
                ChangeKind::Reinstall => &mut changes.reinstall,
                ChangeKind::Immutable => &mut changes.immutable,
            };
            bucket.insert(field.clone());
        }
        Ok(changes)
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty() && self.reinstall.is_empty() && self.immutable.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.metadata.contains(field) || self.reinstall.contains(field) || self.immutable.contains(field)
    }

    pub fn has_metadata(&self) -> bool {
        !self.metadata.is_empty()
    }

    pub fn has_reinstall(&self) -> bool {
        !self.reinstall.is_empty()
    }
}

/// Drives a [`Resource`] strategy from attribute documents
pub struct Reconciler<R: Resource> {
    resource: R,
}

impl<R: Resource> Reconciler<R> {
    pub fn new(resource: R) -> Self {
        Self { resource }
    }

    fn config(&self, attributes: &Value) -> Result<R::Config> {
        serde_json::from_value(attributes.clone()).map_err(|e| {
            Error::invalid_attribute(self.resource.type_name(), format!("invalid attributes: {}", e))
        })
    }

    async fn observe(&self, ctx: &ProviderContext, id: &str, config: Option<&R::Config>) -> Result<Value> {
        let state = self.resource.read(ctx, id, config).await?;
        Ok(serde_json::to_value(state)?)
    }

    /// Create the resource and return its full observed state
    pub async fn create(&self, ctx: &ProviderContext, planned: &Value) -> Result<Value> {
        let config = self.config(planned)?;
        self.resource.validate(&config)?;

        let kind = self.resource.type_name();
        info!("Creating {}", kind);
        let id = self.resource.create(ctx, &config).await?;
        info!("Created {} {}", kind, id);

        self.observe(ctx, &id, Some(&config)).await
    }

    /// Refresh the observed state; `None` when the resource is gone
    pub async fn read(&self, ctx: &ProviderContext, current: &Value) -> Result<Option<Value>> {
        let id = state::resource_id(current)?;
        let config = self.config(current)?;
        match self.observe(ctx, &id, Some(&config)).await {
            Ok(state) => Ok(Some(state)),
            Err(e) if e.is_not_found() => {
                info!("{} {} no longer exists", self.resource.type_name(), id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Move the resource from `prior` to `planned`
    pub async fn update(&self, ctx: &ProviderContext, prior: &Value, planned: &Value) -> Result<Value> {
        let kind = self.resource.type_name();
        let id = state::resource_id(prior)?;
        let prior_config = self.config(prior)?;
        let desired = self.config(planned)?;

        let changes = ChangeSet::between(&self.resource, &prior_config, &desired)?;
        if changes.is_empty() {
            debug!("{} {} has no changes", kind, id);
            return Ok(prior.clone());
        }
        if let Some(field) = changes.immutable.iter().next() {
            return Err(Error::immutable(kind, field.as_str()));
        }
        self.resource.validate(&desired)?;

        info!(
            "Updating {} {} (metadata: {:?}, reinstall: {:?})",
            kind, id, changes.metadata, changes.reinstall
        );
        self.resource
            .update(ctx, &id, &prior_config, &desired, &changes)
            .await?;

        self.observe(ctx, &id, Some(&desired)).await
    }

    /// Delete the resource described by `prior`
    pub async fn delete(&self, ctx: &ProviderContext, prior: &Value) -> Result<()> {
        let id = state::resource_id(prior)?;
        let config = self.config(prior)?;
        info!("Deleting {} {}", self.resource.type_name(), id);
        self.resource.delete(ctx, &id, &config).await
    }

    /// Read an existing resource by id into a fresh state
    pub async fn import(&self, ctx: &ProviderContext, id: &str) -> Result<Value> {
        info!("Importing {} {}", self.resource.type_name(), id);
        self.observe(ctx, id, None).await
    }
}

/// Type-erased reconciler, dispatched by resource type name
#[async_trait]
pub trait ManagedResource: Send + Sync {
    fn type_name(&self) -> &'static str;
    async fn create(&self, ctx: &ProviderContext, planned: &Value) -> Result<Value>;
    async fn read(&self, ctx: &ProviderContext, current: &Value) -> Result<Option<Value>>;
    async fn update(&self, ctx: &ProviderContext, prior: &Value, planned: &Value) -> Result<Value>;
    async fn delete(&self, ctx: &ProviderContext, prior: &Value) -> Result<()>;
    async fn import(&self, ctx: &ProviderContext, id: &str) -> Result<Value>;
}

#[async_trait]
impl<R: Resource> ManagedResource for Reconciler<R> {
    fn type_name(&self) -> &'static str {
        self.resource.type_name()
    }

    async fn create(&self, ctx: &ProviderContext, planned: &Value) -> Result<Value> {
        Reconciler::create(self, ctx, planned).await
    }

    async fn read(&self, ctx: &ProviderContext, current: &Value) -> Result<Option<Value>> {
        Reconciler::read(self, ctx, current).await
    }

    async fn update(&self, ctx: &ProviderContext, prior: &Value, planned: &Value) -> Result<Value> {
        Reconciler::update(self, ctx, prior, planned).await
    }

    async fn delete(&self, ctx: &ProviderContext, prior: &Value) -> Result<()> {
        Reconciler::delete(self, ctx, prior).await
    }

    async fn import(&self, ctx: &ProviderContext, id: &str) -> Result<Value> {
        Reconciler::import(self, ctx, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(default)]
    struct Config {
        name: String,
        image: String,
        region: String,
        ssh_keys: Vec<i64>,
        public: bool,
    }

    struct Fake;

    #[async_trait]
    impl Resource for Fake {
        type Config = Config;
        type State = Config;

        fn type_name(&self) -> &'static str {
            "fake"
        }

        fn change_kind(&self, field: &str) -> ChangeKind {
            match field {
                "name" | "public" => ChangeKind::Metadata,
                "image" | "ssh_keys" => ChangeKind::Reinstall,
                _ => ChangeKind::Immutable,
            }
        }

        async fn create(&self, _: &ProviderContext, _: &Config) -> Result<String> {
            unimplemented!()
        }

        async fn read(&self, _: &ProviderContext, _: &str, _: Option<&Config>) -> Result<Config> {
            unimplemented!()
        }

        async fn update(&self, _: &ProviderContext, _: &str, _: &Config, _: &Config, _: &ChangeSet) -> Result<()> {
            unimplemented!()
        }

        async fn delete(&self, _: &ProviderContext, _: &str, _: &Config) -> Result<()> {
            unimplemented!()
        }
    }

    fn prior() -> Config {
        Config {
            name: "web".to_string(),
            image: "ubuntu".to_string(),
            region: "EU".to_string(),
            ssh_keys: vec![1],
            public: true,
        }
    }

    #[test]
    fn test_identical_configs_have_no_changes() {
        let changes = ChangeSet::between(&Fake, &prior(), &prior()).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn test_metadata_change_is_not_reinstall() {
        let desired = Config {
            name: "api".to_string(),
            ..prior()
        };
        let changes = ChangeSet::between(&Fake, &prior(), &desired).unwrap();
        assert!(changes.has_metadata());
        assert!(!changes.has_reinstall());
        assert!(changes.contains("name"));
    }

    #[test]
    fn test_reinstall_fields_always_classified() {
        let desired = Config {
            image: "debian".to_string(),
            ssh_keys: vec![1, 2],
            ..prior()
        };
        let changes = ChangeSet::between(&Fake, &prior(), &desired).unwrap();
        assert_eq!(changes.reinstall.len(), 2);
        assert!(!changes.has_metadata());
    }

    #[test]
    fn test_immutable_and_unset_fields() {
        let desired = Config {
            region: "US".to_string(),
            image: String::new(),
            ..prior()
        };
        let changes = ChangeSet::between(&Fake, &prior(), &desired).unwrap();
        assert!(changes.immutable.contains("region"));
        assert!(!changes.contains("image"));
    }

    #[test]
    fn test_false_is_a_real_value() {
        let desired = Config {
            public: false,
            ..prior()
        };
        let changes = ChangeSet::between(&Fake, &prior(), &desired).unwrap();
        assert!(changes.metadata.contains("public"));
    }

    #[test]
    fn test_emptied_list_is_a_change() {
        let desired = Config {
            ssh_keys: vec![],
            ..prior()
        };
        let changes = ChangeSet::between(&Fake, &prior(), &desired).unwrap();
        assert!(changes.reinstall.contains("ssh_keys"));

        let never_set = Config {
            ssh_keys: vec![],
            ..prior()
        };
        let changes = ChangeSet::between(&Fake, &never_set, &desired).unwrap();
        assert!(changes.is_empty());
    }
}
