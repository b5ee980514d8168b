//! In-memory token cache in front of the `evm_tokens` table

use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::models::EvmToken;

/// Entries are shared `Arc`s and never mutated. A backfill replaces the entry.
#[derive(Clone)]
pub struct TokenCache {
    cache: Cache<String, Arc<EvmToken>>,
}

impl TokenCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    pub async fn get(&self, identifier: &str) -> Option<Arc<EvmToken>> {
        let token = self.cache.get(identifier).await;
        if token.is_some() {
            debug!("Token cache hit: {}", identifier);
        }
        token
    }

    pub async fn insert(&self, token: Arc<EvmToken>) {
        self.cache.insert(token.identifier.clone(), token).await;
    }

    pub async fn invalidate(&self, identifier: &str) {
        self.cache.invalidate(identifier).await;
        debug!("Invalidated cached token: {}", identifier);
    }
}
