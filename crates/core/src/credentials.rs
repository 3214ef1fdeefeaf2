//! Process-wide cache for the catalog access token.
//!
//! [`CredentialCache::get_valid_token`] is a pre-check: it refreshes before the
//! caller talks to the catalog, never as a retry after a rejected call. The
//! refresh runs while holding the cache lock, so callers racing on an expired
//! token trigger one fetch and all of them observe its result.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

#[derive(Clone, Debug)]
pub struct Credential {
    pub access_token: AccessToken,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("token request failed: {0}")]
    Request(String),
    #[error("token endpoint rejected client credentials with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("token response could not be decoded: {0}")]
    Decode(String),
}

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self) -> Result<Credential, CredentialError>;
}

pub type Clock = fn() -> DateTime<Utc>;

pub struct CredentialCache {
    source: Arc<dyn TokenSource>,
    current: Mutex<Option<Credential>>,
    clock: Clock,
}

impl CredentialCache {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self { source, current: Mutex::new(None), clock: Utc::now }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Seeds the cache, e.g. with a credential fetched during startup.
    pub fn with_credential(self, credential: Credential) -> Self {
        Self { current: Mutex::new(Some(credential)), ..self }
    }

    /// Returns the cached token, fetching a new one first when none is cached
    /// or the cached one has reached its expiry instant. At most one fetch is
    /// made per call.
    pub async fn get_valid_token(&self) -> Result<AccessToken, CredentialError> {
        let mut current = self.current.lock().await;
        let now = (self.clock)();

        if let Some(credential) = current.as_ref() {
            if !credential.is_expired_at(now) {
                return Ok(credential.access_token.clone());
            }
            debug!(
                event_name = "catalog.credential_expired",
                expired_at = %credential.expires_at,
                "cached catalog credential expired; refreshing"
            );
        }

        let fresh = self.source.fetch_token().await.map_err(|error| {
            warn!(
                event_name = "catalog.credential_refresh_failed",
                error = %error,
                "failed to refresh catalog credential"
            );
            error
        })?;
        info!(
            event_name = "catalog.credential_refreshed",
            expires_at = %fresh.expires_at,
            "catalog credential refreshed"
        );

        let token = fresh.access_token.clone();
        *current = Some(fresh);
        Ok(token)
    }

    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.current.lock().await.as_ref().map(|credential| credential.expires_at)
    }
}
