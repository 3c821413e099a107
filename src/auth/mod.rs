//! Bearer-token acquisition for cloud-gated (Azure AD) endpoints.
//!
//! A [`BearerTokenProvider`] owns a credential chain and caches the last token until
//! shortly before it expires. It is built once per process by the client builder.

pub mod azure;

use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use tracing::{debug, info};

use crate::error::Error;

pub use azure::{AzureCliCredential, ManagedIdentityCredential};

/// Tokens are refreshed this long before they expire.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    /// `None` when the issuer did not say; such tokens are used until a call fails.
    pub expires_at: Option<SystemTime>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AccessToken {
    pub fn expires_in_secs(token: impl Into<String>, secs_from_epoch: u64) -> Self {
        Self {
            token: token.into(),
            expires_at: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(secs_from_epoch)),
        }
    }

    fn is_fresh(&self, now: SystemTime) -> bool {
        match self.expires_at {
            Some(at) => now + REFRESH_MARGIN < at,
            None => true,
        }
    }
}

/// Source of OAuth access tokens for a scope.
pub trait TokenCredential: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    fn get_token(&self, scope: &str) -> Result<AccessToken, Error>;
}

/// Tries each credential in order and returns the first token obtained.
#[derive(Debug)]
pub struct ChainedTokenCredential {
    sources: Vec<Box<dyn TokenCredential>>,
}

impl ChainedTokenCredential {
    pub fn new(sources: Vec<Box<dyn TokenCredential>>) -> Self {
        Self { sources }
    }

    /// Azure CLI first, then managed identity.
    pub fn azure_default(managed_identity_client_id: Option<String>) -> Self {
        Self::new(vec![
            Box::new(AzureCliCredential::new()),
            Box::new(ManagedIdentityCredential::new(managed_identity_client_id)),
        ])
    }
}

impl TokenCredential for ChainedTokenCredential {
    fn name(&self) -> &str {
        "chained"
    }

    fn get_token(&self, scope: &str) -> Result<AccessToken, Error> {
        let mut failures = Vec::new();
        for source in &self.sources {
            match source.get_token(scope) {
                Ok(token) => {
                    info!(credential = source.name(), scope, "acquired access token");
                    return Ok(token);
                }
                Err(e) => {
                    debug!(credential = source.name(), error = %e, "credential unavailable");
                    failures.push(format!("{}: {}", source.name(), e));
                }
            }
        }
        Err(Error::Credential(format!(
            "no credential in the chain produced a token for '{}' [{}]",
            scope,
            failures.join("; ")
        )))
    }
}

/// Caching bearer-token provider for one scope.
#[derive(Debug)]
pub struct BearerTokenProvider {
    credential: Box<dyn TokenCredential>,
    scope: String,
    cached: Mutex<Option<AccessToken>>,
}

impl BearerTokenProvider {
    pub fn new(credential: Box<dyn TokenCredential>, scope: impl Into<String>) -> Self {
        Self {
            credential,
            scope: scope.into(),
            cached: Mutex::new(None),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Current token, fetching a new one when the cached token is near expiry.
    pub fn token(&self) -> Result<String, Error> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| Error::Credential("token cache poisoned".to_string()))?;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(SystemTime::now()) {
                return Ok(token.token.clone());
            }
        }
        let fresh = self.credential.get_token(&self.scope)?;
        let value = fresh.token.clone();
        *cached = Some(fresh);
        Ok(value)
    }
}
