//! Provider configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use contabo_common::{Error, Result};

use crate::auth::OAuth2Credentials;
use crate::client::DEFAULT_API_URL;
use crate::poll::PollPolicy;

pub const DEFAULT_TOKEN_URL: &str =
    "https://auth.contabo.com/auth/realms/contabo/protocol/openid-connect/token";

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Control-plane base URL
    pub api: String,

    /// OAuth2 token endpoint
    pub oauth2_token_url: String,

    pub oauth2_client_id: String,

    pub oauth2_client_secret: String,

    pub oauth2_user: String,

    pub oauth2_pass: String,

    /// Token cache file, defaults to the user cache directory
    pub token_cache_path: Option<PathBuf>,

    /// Delay between status polls
    pub poll_interval_ms: u64,

    /// Polls before giving up on a resource
    pub poll_max_attempts: u32,

    /// Cancel instances on destroy instead of only forgetting them
    pub cancel_instance_on_destroy: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        let poll = PollPolicy::default();
        Self {
            api: DEFAULT_API_URL.to_string(),
            oauth2_token_url: DEFAULT_TOKEN_URL.to_string(),
            oauth2_client_id: String::new(),
            oauth2_client_secret: String::new(),
            oauth2_user: String::new(),
            oauth2_pass: String::new(),
            token_cache_path: None,
            poll_interval_ms: poll.interval.as_millis() as u64,
            poll_max_attempts: poll.max_attempts,
            cancel_instance_on_destroy: false,
        }
    }
}

impl ProviderConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(Duration::from_millis(self.poll_interval_ms), self.poll_max_attempts)
    }

    /// Check the configuration and extract the login credentials
    pub fn credentials(&self) -> Result<OAuth2Credentials> {
        Url::parse(&self.api)
            .map_err(|e| Error::InvalidConfig(format!("api url {:?}: {}", self.api, e)))?;
        let token_url = Url::parse(&self.oauth2_token_url).map_err(|e| {
            Error::InvalidConfig(format!("oauth2_token_url {:?}: {}", self.oauth2_token_url, e))
        })?;

        for (name, value) in [
            ("oauth2_client_id", &self.oauth2_client_id),
            ("oauth2_client_secret", &self.oauth2_client_secret),
            ("oauth2_user", &self.oauth2_user),
            ("oauth2_pass", &self.oauth2_pass),
        ] {
            if value.is_empty() {
                return Err(Error::InvalidConfig(format!("{} must be set", name)));
            }
        }

        Ok(OAuth2Credentials {
            token_url,
            client_id: self.oauth2_client_id.clone(),
            client_secret: self.oauth2_client_secret.clone(),
            username: self.oauth2_user.clone(),
            password: self.oauth2_pass.clone(),
        })
    }
}
