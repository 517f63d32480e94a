use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::cache::token::CachedToken;
use crate::observability::metrics::get_metrics;
use crate::sources::identity::{CredentialError, IdentityIssuer};

/// Audience-keyed token cache: read-mostly, write-on-refresh.
///
/// Each audience owns its own slot lock, so a refresh for one audience
/// never blocks callers for another. Staleness is checked lazily at read
/// time; there is no sweep timer.
#[derive(Clone)]
pub struct TokenCache {
    issuer: Arc<IdentityIssuer>,
    safety_margin_secs: u64,
    entries: Arc<RwLock<HashMap<String, Arc<RwLock<Option<CachedToken>>>>>>,
}

impl TokenCache {
    pub fn new(issuer: IdentityIssuer, safety_margin_secs: u64) -> Self {
        Self {
            issuer: Arc::new(issuer),
            safety_margin_secs,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Return a bearer token for `audience`, minting through the issuer
    /// when the cached one has less than the safety margin remaining.
    pub async fn get_token(&self, audience: &str) -> Result<String, CredentialError> {
        let metrics = get_metrics().await;
        let slot = self.slot(audience).await;

        // Fast path: cached and still fresh.
        {
            let cached = slot.read().await;
            if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(self.safety_margin_secs)) {
                metrics.token_cache_hits.with_label_values(&[audience]).inc();
                return Ok(token.value.clone());
            }
        }

        // Slow path: the slot write lock serializes the mint per audience.
        // Callers that queued behind an in-flight mint re-check and reuse
        // its result instead of minting again.
        let mut cached = slot.write().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(self.safety_margin_secs)) {
            metrics.token_cache_hits.with_label_values(&[audience]).inc();
            return Ok(token.value.clone());
        }

        let minted = match self.issuer.mint(audience).await {
            Ok(token) => token,
            Err(e) => {
                // Failures are not cached; the next caller retries the mint.
                metrics.token_mint_failures.with_label_values(&[audience]).inc();
                return Err(e);
            }
        };

        info!(audience, expires_at = minted.expires_at, "identity token refreshed");
        metrics.token_refreshes.with_label_values(&[audience]).inc();

        let value = minted.value.clone();
        *cached = Some(minted);
        Ok(value)
    }

    /// Slot handle for `audience`. The map lock is only held for the
    /// lookup/insert itself, never across an await.
    async fn slot(&self, audience: &str) -> Arc<RwLock<Option<CachedToken>>> {
        {
            let map = self.entries.read().await;
            if let Some(slot) = map.get(audience) {
                return slot.clone();
            }
        }
        let mut map = self.entries.write().await;
        map.entry(audience.to_string()).or_default().clone()
    }
}
