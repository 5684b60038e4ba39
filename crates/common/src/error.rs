//! Error types for the Contabo provider

use thiserror::Error;

/// Result type alias using the provider Error
pub type Result<T> = std::result::Result<T, Error>;

/// Provider error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unexpected API error, no http response: {0}")]
    NoResponse(String),

    #[error("API error, status code: {status}, details: {message}")]
    Api { status: u16, message: String },

    #[error("Resource not found: {kind} with id {id}{}", detail_suffix(.message))]
    NotFound {
        kind: String,
        id: String,
        /// Message reported by the API, if any
        message: String,
    },

    #[error("API response returned empty data: {0}")]
    NoData(String),

    #[error("API response had multiple data objects ({count}) for {context}")]
    MultipleDataObjects { context: String, count: usize },

    #[error("{kind} {id} entered error state: {message}")]
    ProvisioningFailed {
        kind: String,
        id: String,
        message: String,
    },

    #[error("{kind} {id} did not reach a terminal status after {attempts} attempts")]
    Timeout {
        kind: String,
        id: String,
        attempts: u32,
    },

    #[error("Operation cancelled while waiting for {kind} {id}")]
    Cancelled { kind: String, id: String },

    #[error("It is not possible to update {field} of {kind}, please create a new resource instead")]
    ImmutableField { kind: String, field: String },

    #[error("Invalid identifier {id:?}: {reason}")]
    InvalidCompositeId { id: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Object storage credentials error: {0}")]
    Credentials(String),

    #[error("Could not create bucket {0}. Name may contain unaccepted characters. See https://docs.aws.amazon.com/awscloudtrail/latest/userguide/cloudtrail-s3-bucket-naming-requirements.html for more info")]
    InvalidBucketName(String),

    #[error("S3 error: {0}")]
    S3(String),

    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("Invalid attribute {attribute}: {reason}")]
    InvalidAttribute { attribute: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

fn detail_suffix(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(", details: {}", message)
    }
}

impl Error {
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.into(),
            id: id.into(),
            message: String::new(),
        }
    }

    /// Attach the message the remote side gave for a missing resource
    pub fn with_detail(self, detail: impl Into<String>) -> Self {
        match self {
            Error::NotFound { kind, id, .. } => Error::NotFound {
                kind,
                id,
                message: detail.into(),
            },
            other => other,
        }
    }

    pub fn immutable(kind: impl Into<String>, field: impl Into<String>) -> Self {
        Error::ImmutableField {
            kind: kind.into(),
            field: field.into(),
        }
    }

    pub fn invalid_attribute(attribute: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidAttribute {
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }

    /// Whether the remote side reported the resource as gone
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Whether the API answered with 409 Conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Api { status: 409, .. })
    }
}
