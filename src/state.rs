use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

use crate::assets::TokenResolver;
use crate::blockchain::{ChainError, RpcClient};
use crate::cache::{CacheStore, TokenCache};
use crate::config::Config;
use crate::notifier::Notifier;
use crate::sync::ProtocolSyncer;

/// Process wide services, built once and handed to whatever needs them.
pub struct AppState {
    pub config: Config,
    pub db_pool: SqlitePool,
    pub cache_store: CacheStore,
    pub resolver: Arc<TokenResolver>,
    pub notifier: Notifier,
    pub rpc_client: Arc<RpcClient>,
}

impl AppState {
    pub fn initialize(config: Config, db_pool: SqlitePool) -> Result<Self, ChainError> {
        let notifier = Notifier::new(config.notifier_capacity);
        let tokens = TokenCache::new(config.token_cache_capacity, config.token_cache_ttl);
        let resolver = Arc::new(TokenResolver::new(db_pool.clone(), tokens, notifier.clone()));
        let rpc_client = Arc::new(RpcClient::new(&config)?);

        info!(
            "Token cache initialized with TTL: {:?} and capacity: {}",
            config.token_cache_ttl, config.token_cache_capacity
        );

        Ok(Self {
            cache_store: CacheStore::new(db_pool.clone()),
            config,
            db_pool,
            resolver,
            notifier,
            rpc_client,
        })
    }

    pub fn syncer(&self) -> ProtocolSyncer {
        ProtocolSyncer::new(
            self.cache_store.clone(),
            self.resolver.clone(),
            self.config.protocol_cache_refresh,
        )
    }
}
