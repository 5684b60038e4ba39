//! Shared fixtures for the provider integration tests
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use wiremock::{MockServer, ResponseTemplate};

use contabo_common::{Error, Result};
use contabo_provider::auth::StaticToken;
use contabo_provider::client::ApiClient;
use contabo_provider::poll::PollPolicy;
use contabo_provider::s3::{BucketInfo, S3Api, S3Connector, S3Credentials};
use contabo_provider::ProviderContext;

pub const TOKEN: &str = "test-token";
pub const USER_ID: &str = "user-1";

pub fn fast_poll() -> PollPolicy {
    PollPolicy::new(Duration::from_millis(5), 20)
}

pub fn context(server: &MockServer) -> ProviderContext {
    context_with_s3(server, MemoryS3::default())
}

pub fn context_with_s3(server: &MockServer, s3: MemoryS3) -> ProviderContext {
    let api = ApiClient::new(&server.uri(), Arc::new(StaticToken::new(TOKEN))).unwrap();
    ProviderContext::new(api, USER_ID, Arc::new(s3)).with_poll_policy(fast_poll())
}

/// `200 {"data": [value]}`
pub fn data(value: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "data": [value] }))
}

pub fn instance(id: i64, status: &str) -> Value {
    json!({
        "instanceId": id,
        "name": format!("vmi{}", id),
        "displayName": "web",
        "imageId": "ubuntu-22",
        "region": "EU",
        "productId": "V45",
        "sshKeys": [1],
        "status": status
    })
}

#[derive(Debug, Default)]
pub struct MemoryS3State {
    /// Bucket name to policy document
    pub buckets: BTreeMap<String, Option<String>>,
    pub policy_puts: Vec<(String, String)>,
    pub connections: Vec<(String, String)>,
    /// Reject every policy update
    pub deny_policies: bool,
}

/// In-memory S3 endpoint
#[derive(Debug, Clone, Default)]
pub struct MemoryS3 {
    pub state: Arc<Mutex<MemoryS3State>>,
}

impl MemoryS3 {
    pub fn with_bucket(self, name: &str) -> Self {
        self.state.lock().unwrap().buckets.insert(name.to_string(), None);
        self
    }

    pub fn denying_policies(self) -> Self {
        self.state.lock().unwrap().deny_policies = true;
        self
    }

    pub fn policy(&self, name: &str) -> Option<String> {
        self.state.lock().unwrap().buckets.get(name).cloned().flatten()
    }

    pub fn policy_puts(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().policy_puts.clone()
    }

    pub fn has_bucket(&self, name: &str) -> bool {
        self.state.lock().unwrap().buckets.contains_key(name)
    }
}

impl S3Connector for MemoryS3 {
    fn connect(&self, endpoint: &str, credentials: &S3Credentials) -> Result<Box<dyn S3Api>> {
        self.state
            .lock()
            .unwrap()
            .connections
            .push((endpoint.to_string(), credentials.access_key.clone()));
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl S3Api for MemoryS3 {
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .buckets
            .keys()
            .map(|name| BucketInfo {
                name: name.clone(),
                creation_date: None,
            })
            .collect())
    }

    async fn create_bucket(&self, name: &str) -> Result<()> {
        if name.chars().any(|c| c.is_ascii_uppercase() || c == '_') {
            return Err(Error::S3(format!("Bucket name {} contains invalid characters", name)));
        }
        let mut state = self.state.lock().unwrap();
        if state.buckets.contains_key(name) {
            return Err(Error::S3(format!("BucketAlreadyOwnedByYou: {}", name)));
        }
        state.buckets.insert(name.to_string(), None);
        Ok(())
    }

    async fn delete_bucket(&self, name: &str) -> Result<()> {
        match self.state.lock().unwrap().buckets.remove(name) {
            Some(_) => Ok(()),
            None => Err(Error::S3(format!("NoSuchBucket: {}", name))),
        }
    }

    async fn put_bucket_policy(&self, name: &str, policy: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.deny_policies {
            return Err(Error::S3(format!("AccessDenied: PutBucketPolicy on {}", name)));
        }
        match state.buckets.get_mut(name) {
            Some(slot) => *slot = Some(policy.to_string()),
            None => return Err(Error::S3(format!("NoSuchBucket: {}", name))),
        }
        state.policy_puts.push((name.to_string(), policy.to_string()));
        Ok(())
    }

    async fn get_bucket_policy(&self, name: &str) -> Result<Option<String>> {
        match self.state.lock().unwrap().buckets.get(name) {
            Some(policy) => Ok(policy.clone()),
            None => Err(Error::S3(format!("NoSuchBucket: {}", name))),
        }
    }
}
