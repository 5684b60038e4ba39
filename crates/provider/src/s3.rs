//! Object storage bucket workflow
//!
//! Buckets live behind the S3-compatible endpoint of an object storage.
//! Access goes through credentials fetched from the control plane for the
//! authenticated user; public sharing is a bucket policy that allows
//! anonymous `s3:GetObject`.

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info};
use url::Url;

use contabo_common::{Error, ObjectStorageResponse, Result};

use crate::client::ApiClient;
use crate::context::ProviderContext;

/// Policy applied when public sharing is disabled
pub const PRIVATE_POLICY: &str = r#"{"Id":"CntbPolicy","Version":"2012-10-17","Statement":[]}"#;

/// Region used for request signing; the endpoint decides the real location
const SIGNING_REGION: &str = "us-east-1";

/// Access key pair for one object storage. Never persisted.
#[derive(Clone)]
pub struct S3Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Bucket as listed by the S3 endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct BucketInfo {
    pub name: String,
    pub creation_date: Option<DateTime<Utc>>,
}

/// The subset of the S3 API the provider needs
#[async_trait]
pub trait S3Api: Send + Sync {
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>>;
    async fn create_bucket(&self, name: &str) -> Result<()>;
    async fn delete_bucket(&self, name: &str) -> Result<()>;
    async fn put_bucket_policy(&self, name: &str, policy: &str) -> Result<()>;
    /// `None` when the bucket has no policy
    async fn get_bucket_policy(&self, name: &str) -> Result<Option<String>>;
}

/// Builds an [`S3Api`] for an endpoint and credential pair
pub trait S3Connector: Send + Sync {
    fn connect(&self, endpoint: &str, credentials: &S3Credentials) -> Result<Box<dyn S3Api>>;
}

/// Connector backed by `aws-sdk-s3`
#[derive(Debug, Clone, Default)]
pub struct AwsS3Connector;

impl S3Connector for AwsS3Connector {
    fn connect(&self, endpoint: &str, credentials: &S3Credentials) -> Result<Box<dyn S3Api>> {
        let credentials = Credentials::new(
            credentials.access_key.clone(),
            credentials.secret_key.clone(),
            None,
            None,
            "contabo-object-storage",
        );
        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(SIGNING_REGION))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();
        Ok(Box::new(AwsS3 {
            client: aws_sdk_s3::Client::from_conf(config),
        }))
    }
}

struct AwsS3 {
    client: aws_sdk_s3::Client,
}

fn s3_error<E, R>(bucket: &str, err: SdkError<E, R>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err.code() {
        Some("InvalidBucketName") => Error::InvalidBucketName(bucket.to_string()),
        _ => Error::S3(DisplayErrorContext(&err).to_string()),
    }
}

#[async_trait]
impl S3Api for AwsS3 {
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| s3_error("", e))?;
        Ok(output
            .buckets()
            .iter()
            .filter_map(|bucket| {
                let name = bucket.name()?.to_string();
                let creation_date = bucket
                    .creation_date()
                    .and_then(|d| DateTime::from_timestamp(d.secs(), d.subsec_nanos()));
                Some(BucketInfo { name, creation_date })
            })
            .collect())
    }

    async fn create_bucket(&self, name: &str) -> Result<()> {
        self.client
            .create_bucket()
            .bucket(name)
            .send()
            .await
            .map_err(|e| s3_error(name, e))?;
        Ok(())
    }

    async fn delete_bucket(&self, name: &str) -> Result<()> {
        self.client
            .delete_bucket()
            .bucket(name)
            .send()
            .await
            .map_err(|e| s3_error(name, e))?;
        Ok(())
    }

    async fn put_bucket_policy(&self, name: &str, policy: &str) -> Result<()> {
        self.client
            .put_bucket_policy()
            .bucket(name)
            .policy(policy)
            .send()
            .await
            .map_err(|e| s3_error(name, e))?;
        Ok(())
    }

    async fn get_bucket_policy(&self, name: &str) -> Result<Option<String>> {
        match self.client.get_bucket_policy().bucket(name).send().await {
            Ok(output) => Ok(output.policy().map(str::to_string)),
            Err(e) if e.code() == Some("NoSuchBucketPolicy") => Ok(None),
            Err(e) => Err(s3_error(name, e)),
        }
    }
}

/// Policy allowing anonymous reads of every object in `bucket`
pub fn public_read_policy(bucket: &str) -> String {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Action": ["s3:GetObject"],
            "Effect": "Allow",
            "Principal": { "AWS": ["*"] },
            "Resource": [format!("arn:aws:s3:::{}/*", bucket)],
            "Sid": ""
        }]
    })
    .to_string()
}

/// Whether a policy document grants anonymous `s3:GetObject`
pub fn is_public_policy(policy: &str) -> bool {
    let Ok(doc) = serde_json::from_str::<Value>(policy) else {
        return false;
    };
    let statements = doc
        .get("Statement")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    statements.iter().any(|statement| {
        let allows = statement.get("Effect").and_then(Value::as_str) == Some("Allow");
        let reads = match statement.get("Action") {
            Some(Value::String(action)) => action == "s3:GetObject",
            Some(Value::Array(actions)) => actions.iter().any(|a| a.as_str() == Some("s3:GetObject")),
            _ => false,
        };
        allows && reads
    })
}

/// Fetch the single credential pair of `user_id` for an object storage
pub async fn fetch_credentials(api: &ApiClient, user_id: &str, object_storage_id: &str) -> Result<S3Credentials> {
    let mut credentials = api.object_storage_credentials(user_id, object_storage_id).await?;
    match credentials.len() {
        1 => {
            let pair = credentials.remove(0);
            Ok(S3Credentials {
                access_key: pair.access_key,
                secret_key: pair.secret_key,
            })
        }
        0 => Err(Error::Credentials(format!(
            "no S3 credentials found for object storage {}",
            object_storage_id
        ))),
        n => Err(Error::Credentials(format!(
            "expected one S3 credential pair for object storage {}, found {}",
            object_storage_id, n
        ))),
    }
}

/// Endpoint (`scheme://host[:port]`) of an object storage's `s3Url`
pub fn s3_endpoint(s3_url: &str) -> Result<String> {
    let url = Url::parse(s3_url)?;
    let host = url
        .host_str()
        .ok_or_else(|| Error::S3(format!("object storage url {} has no host", s3_url)))?;
    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

/// Authenticated access to the buckets of one object storage
pub struct ObjectStorageSession {
    object_storage: ObjectStorageResponse,
    client: Box<dyn S3Api>,
}

impl ObjectStorageSession {
    pub async fn open(ctx: &ProviderContext, object_storage_id: &str) -> Result<Self> {
        let object_storage = ctx.api.get_object_storage(object_storage_id).await?;
        let credentials = fetch_credentials(&ctx.api, &ctx.user_id, object_storage_id).await?;
        let endpoint = s3_endpoint(&object_storage.s3_url)?;
        debug!("Connecting to object storage {} at {}", object_storage_id, endpoint);
        let client = ctx.s3.connect(&endpoint, &credentials)?;
        Ok(Self {
            object_storage,
            client,
        })
    }

    pub fn object_storage(&self) -> &ObjectStorageResponse {
        &self.object_storage
    }

    pub async fn create_bucket(&self, name: &str) -> Result<()> {
        info!("Creating bucket {} in {}", name, self.object_storage.object_storage_id);
        self.client.create_bucket(name).await.map_err(|e| match e {
            Error::S3(message) if message.to_lowercase().contains("invalid characters") => {
                Error::InvalidBucketName(name.to_string())
            }
            other => other,
        })
    }

    /// Look the bucket up by scanning the bucket list
    pub async fn find_bucket(&self, name: &str) -> Result<Option<BucketInfo>> {
        Ok(self
            .client
            .list_buckets()
            .await?
            .into_iter()
            .find(|bucket| bucket.name == name))
    }

    pub async fn delete_bucket(&self, name: &str) -> Result<()> {
        info!("Deleting bucket {} in {}", name, self.object_storage.object_storage_id);
        self.client.delete_bucket(name).await
    }

    /// Allow anonymous reads and return the public link
    pub async fn enable_public_sharing(&self, name: &str) -> Result<String> {
        info!("Enabling public sharing for bucket {}", name);
        self.client
            .put_bucket_policy(name, &public_read_policy(name))
            .await?;
        Ok(self.public_sharing_link(name))
    }

    pub async fn disable_public_sharing(&self, name: &str) -> Result<()> {
        info!("Disabling public sharing for bucket {}", name);
        self.client.put_bucket_policy(name, PRIVATE_POLICY).await
    }

    pub async fn is_public(&self, name: &str) -> Result<bool> {
        Ok(self
            .client
            .get_bucket_policy(name)
            .await?
            .map_or(false, |policy| is_public_policy(&policy)))
    }

    /// `{s3Url}/{s3TenantId}:{bucket}`
    pub fn public_sharing_link(&self, name: &str) -> String {
        format!(
            "{}/{}:{}",
            self.object_storage.s3_url.trim_end_matches('/'),
            self.object_storage.s3_tenant_id,
            name
        )
    }
}
