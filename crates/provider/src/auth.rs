//! Authenticated transport
//!
//! OAuth2 password and refresh grants against the Contabo identity provider,
//! with the issued token pair persisted to an on-disk cache so consecutive
//! invocations do not log in again.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use jsonwebtoken::{DecodingKey, Validation};

use contabo_common::{Error, Result};

/// Access tokens are treated as expired this long before their real expiry
const EXPIRY_MARGIN_SECS: i64 = 10;

/// Source of bearer tokens for the REST client
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    /// Return a currently valid access token, renewing it if necessary
    async fn access_token(&self) -> Result<String>;
}

/// A pre-issued bearer token that is never renewed
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Token pair as persisted in the cache file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Access token expiry
    pub expiry: DateTime<Utc>,
}

impl Token {
    pub fn access_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry - Duration::seconds(EXPIRY_MARGIN_SECS) <= now
    }

    /// Expiry of the refresh token, taken from its `exp` claim
    pub fn refresh_expiry(&self) -> Option<DateTime<Utc>> {
        let claims: ExpiryClaim = decode_claims(&self.refresh_token).ok()?;
        DateTime::from_timestamp(claims.exp, 0)
    }

    /// A refresh token whose claim cannot be decoded counts as expired
    pub fn refresh_expired(&self, now: DateTime<Utc>) -> bool {
        self.refresh_expiry().map_or(true, |exp| exp <= now)
    }

    /// Whether the token can still be used, directly or through a refresh grant
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !(self.access_expired(now) && self.refresh_expired(now))
    }

    /// Authenticated user id, the `sub` claim of the access token
    pub fn subject(&self) -> Result<String> {
        let claims: SubjectClaim = decode_claims(&self.access_token)?;
        Ok(claims.sub)
    }
}

#[derive(Debug, Deserialize)]
struct ExpiryClaim {
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct SubjectClaim {
    sub: String,
}

/// Decode the claims of a JWT without verifying its signature or expiry
pub fn decode_claims<T: DeserializeOwned>(jwt: &str) -> Result<T> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<T>(jwt, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| Error::Auth(format!("could not decode token claims: {}", e)))
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn into_token(self, now: DateTime<Utc>) -> Token {
        let expiry = self
            .expires_in
            .map(|secs| now + Duration::seconds(secs))
            .or_else(|| {
                decode_claims::<ExpiryClaim>(&self.access_token)
                    .ok()
                    .and_then(|c| DateTime::from_timestamp(c.exp, 0))
            })
            .unwrap_or(now);
        Token {
            access_token: self.access_token,
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
            refresh_token: self.refresh_token.unwrap_or_default(),
            expiry,
        }
    }
}

/// On-disk token cache
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<user cache dir>/contabo/terraform/token`
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::cache_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".cache")))
            .ok_or_else(|| Error::InvalidConfig("could not determine the user cache directory".to_string()))?;
        Ok(base.join("contabo").join("terraform").join("token"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached token. A missing or malformed cache is a miss.
    pub fn load(&self) -> Option<Token> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!("No cached token at {}: {}", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("Ignoring malformed token cache {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Persist `token`, overwriting the previous cache
    pub fn store(&self, token: &Token) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| {
                Error::InvalidConfig(format!("could not create token cache dir {}: {}", dir.display(), e))
            })?;
        }
        let contents = serde_json::to_string(token)?;
        std::fs::write(&self.path, contents).map_err(|e| {
            Error::InvalidConfig(format!("could not write token cache {}: {}", self.path.display(), e))
        })?;
        debug!("Stored token in {}", self.path.display());
        Ok(())
    }
}

/// Resource-owner credentials for the password grant
#[derive(Debug, Clone)]
pub struct OAuth2Credentials {
    pub token_url: Url,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

/// Logged-in OAuth2 session
pub struct OAuth2Session {
    http_client: reqwest::Client,
    credentials: OAuth2Credentials,
    cache: TokenCache,
    token: RwLock<Token>,
}

impl OAuth2Session {
    /// Reuse the cached token when still usable, otherwise log in
    pub async fn establish(credentials: OAuth2Credentials, cache: TokenCache) -> Result<Self> {
        let http_client = reqwest::Client::new();
        let now = Utc::now();

        let token = match cache.load() {
            Some(token) if token.is_usable(now) => {
                debug!("Using cached token from {}", cache.path().display());
                token
            }
            Some(_) => {
                info!("Cached token expired, logging in again");
                password_grant(&http_client, &credentials).await?
            }
            None => password_grant(&http_client, &credentials).await?,
        };
        cache.store(&token)?;

        Ok(Self {
            http_client,
            credentials,
            cache,
            token: RwLock::new(token),
        })
    }

    /// Id of the authenticated user
    pub async fn user_id(&self) -> Result<String> {
        self.token.read().await.subject()
    }

    /// Snapshot of the current token
    pub async fn token(&self) -> Token {
        self.token.read().await.clone()
    }
}

#[async_trait]
impl AccessTokenSource for OAuth2Session {
    async fn access_token(&self) -> Result<String> {
        {
            let token = self.token.read().await;
            if !token.access_expired(Utc::now()) {
                return Ok(token.access_token.clone());
            }
        }

        let mut token = self.token.write().await;
        let now = Utc::now();
        if !token.access_expired(now) {
            return Ok(token.access_token.clone());
        }

        let fresh = if token.refresh_expired(now) {
            info!("Refresh token expired, logging in again");
            password_grant(&self.http_client, &self.credentials).await?
        } else {
            match refresh_grant(&self.http_client, &self.credentials, &token.refresh_token).await {
                Ok(fresh) => fresh,
                Err(e) => {
                    warn!("Token refresh failed, logging in again: {}", e);
                    password_grant(&self.http_client, &self.credentials).await?
                }
            }
        };

        self.cache.store(&fresh)?;
        *token = fresh;
        Ok(token.access_token.clone())
    }
}

async fn password_grant(http_client: &reqwest::Client, credentials: &OAuth2Credentials) -> Result<Token> {
    info!("Requesting access token for {}", credentials.username);
    request_token(
        http_client,
        &credentials.token_url,
        &[
            ("grant_type", "password"),
            ("client_id", &credentials.client_id),
            ("client_secret", &credentials.client_secret),
            ("username", &credentials.username),
            ("password", &credentials.password),
        ],
    )
    .await
}

async fn refresh_grant(
    http_client: &reqwest::Client,
    credentials: &OAuth2Credentials,
    refresh_token: &str,
) -> Result<Token> {
    debug!("Refreshing access token");
    request_token(
        http_client,
        &credentials.token_url,
        &[
            ("grant_type", "refresh_token"),
            ("client_id", &credentials.client_id),
            ("client_secret", &credentials.client_secret),
            ("refresh_token", refresh_token),
        ],
    )
    .await
}

async fn request_token(http_client: &reqwest::Client, token_url: &Url, form: &[(&str, &str)]) -> Result<Token> {
    let resp = http_client
        .post(token_url.clone())
        .form(form)
        .send()
        .await
        .map_err(|e| Error::Auth(format!("Token exchange failed: {}", e)))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Auth(format!("Token exchange failed ({}): {}", status, body)));
    }

    let tokens: TokenResponse = resp
        .json()
        .await
        .map_err(|e| Error::Auth(format!("Token parse failed: {}", e)))?;
    Ok(tokens.into_token(Utc::now()))
}
