//! Per-configuration context shared by every resource operation

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::client::ApiClient;
use crate::poll::PollPolicy;
use crate::s3::S3Connector;

/// Everything a resource strategy needs to talk to the remote side
#[derive(Clone)]
pub struct ProviderContext {
    pub api: ApiClient,
    /// Authenticated user, owner of the object storage credentials
    pub user_id: String,
    pub s3: Arc<dyn S3Connector>,
    pub poll: PollPolicy,
    pub cancel: CancellationToken,
    /// Cancel instances on destroy instead of leaving them running
    pub cancel_instance_on_destroy: bool,
}

impl ProviderContext {
    pub fn new(api: ApiClient, user_id: impl Into<String>, s3: Arc<dyn S3Connector>) -> Self {
        Self {
            api,
            user_id: user_id.into(),
            s3,
            poll: PollPolicy::default(),
            cancel: CancellationToken::new(),
            cancel_instance_on_destroy: false,
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_cancel_instance_on_destroy(mut self, enabled: bool) -> Self {
        self.cancel_instance_on_destroy = enabled;
        self
    }
}
