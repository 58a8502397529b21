//! Installation token cache with TTL-aware refresh.
//!
//! Tokens minted for a GitHub App installation expire; this cache keeps
//! one per installation id and refreshes through the injected
//! [`TokenSource`] shortly before expiry. The cache is an optimization,
//! not a correctness dependency: losing it only costs a re-fetch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use solvebot_core::Error;

/// Buffer before actual expiry to trigger refresh.
const EXPIRY_BUFFER: Duration = Duration::from_secs(300);

/// A freshly minted installation token.
#[derive(Debug, Clone)]
pub struct InstallationToken {
    pub token: String,
    pub expires_in: Duration,
}

/// Mints tokens for an installation id.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self, installation_id: u64) -> Result<InstallationToken, Error>;
}

/// A fixed personal-access-token source for deployments that do not run
/// as a GitHub App. The cache degrades to a pass-through.
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn fetch(&self, _installation_id: u64) -> Result<InstallationToken, Error> {
        if self.token.is_empty() {
            return Err(Error::MissingConfig("github token".into()));
        }
        Ok(InstallationToken {
            token: self.token.clone(),
            expires_in: Duration::from_secs(24 * 3600),
        })
    }
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// TTL-aware token cache keyed by installation id.
pub struct InstallationTokenCache {
    source: Arc<dyn TokenSource>,
    cache: RwLock<HashMap<u64, CachedToken>>,
}

impl InstallationTokenCache {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Get a valid token for the installation, refreshing if the cached
    /// one is absent or inside the expiry buffer.
    pub async fn get(&self, installation_id: u64) -> Result<String, Error> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(&installation_id) {
                if cached.expires_at > Instant::now() + EXPIRY_BUFFER {
                    debug!(installation_id, "Using cached installation token");
                    return Ok(cached.token.clone());
                }
            }
        }

        let minted = self.source.fetch(installation_id).await?;
        let mut cache = self.cache.write().await;
        cache.insert(
            installation_id,
            CachedToken {
                token: minted.token.clone(),
                expires_at: Instant::now() + minted.expires_in,
            },
        );
        debug!(installation_id, "Refreshed installation token");
        Ok(minted.token)
    }
}
