// Protocol topology syncs.
// - ProtocolIntegration: what a protocol must provide (sources, cache key spaces, token hints)
// - ProtocolSyncer: the shared read -> freshness -> query -> validate -> replace -> label -> bump loop
// - curve: Curve pools from the Curve API with the on-chain metaregistry as fallback

pub mod curve;
pub mod runner;

use alloy::primitives::{address, Address};
use async_trait::async_trait;
use thiserror::Error;

use crate::assets::{AssetError, TokenHints};
use crate::blockchain::{ChainError, ChainQuery};
use crate::cache::CacheType;
use crate::models::{ChainId, EvmAddress, EvmToken};

pub use curve::CurveIntegration;
pub use runner::{read_cached_items, ProtocolSyncer};

/// Placeholder address protocols use for the chain's native currency.
pub const NATIVE_TOKEN_ADDRESS: Address = address!("0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee");

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Remote source error: {0}")]
    Remote(String),

    #[error("Chain query error: {0}")]
    Chain(#[from] ChainError),

    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Remote(err.to_string())
    }
}

/// Key spaces one protocol writes to. Every key continues with the chain id.
#[derive(Debug, Clone, Copy)]
pub struct SyncCacheTypes {
    /// general `[items, chain]` -> item address
    pub items: CacheType,
    /// general `[item_tokens, chain, item, index]` -> token address
    pub item_tokens: CacheType,
    /// unique `[lp_tokens, chain, item]` -> lp token address
    pub lp_tokens: CacheType,
    /// unique `[gauges, chain, item]` -> gauge address
    pub gauges: CacheType,
}

impl SyncCacheTypes {
    pub fn all(&self) -> [CacheType; 4] {
        [self.items, self.item_tokens, self.lp_tokens, self.gauges]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenRef {
    pub address: EvmAddress,
    /// Underlying coin wrapped by this one, if any
    pub underlying: Option<EvmAddress>,
}

impl TokenRef {
    pub fn plain(address: EvmAddress) -> Self {
        Self {
            address,
            underlying: None,
        }
    }

    pub fn is_native(&self) -> bool {
        self.address.address() == NATIVE_TOKEN_ADDRESS
    }
}

/// One pool, vault or similar entity of a protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolItem {
    pub address: EvmAddress,
    pub label: Option<String>,
    pub tokens: Vec<TokenRef>,
    pub lp_token: Option<EvmAddress>,
    pub gauge: Option<EvmAddress>,
}

#[derive(Debug)]
pub enum SyncOutcome {
    /// Cache was recent enough, nothing queried
    Fresh { cached: Vec<ProtocolItem> },
    /// Remote count matched the cache, only the timestamp moved
    Unchanged { cached: Vec<ProtocolItem> },
    Refreshed {
        total: usize,
        new: usize,
        skipped: usize,
    },
}

#[async_trait]
pub trait ProtocolIntegration: Send + Sync {
    /// Protocol tag used in progress notifications, e.g. `curve`
    fn protocol(&self) -> &str;

    /// Human readable name used in labels, e.g. `Curve`
    fn display_name(&self) -> &str;

    fn chain_id(&self) -> ChainId;

    fn cache_types(&self) -> SyncCacheTypes;

    fn chain_query(&self) -> Option<&dyn ChainQuery>;

    /// Cheap item count from the remote side, when the protocol has one.
    async fn remote_count(&self) -> Result<Option<usize>, SyncError> {
        Ok(None)
    }

    async fn query_primary(&self) -> Result<Vec<ProtocolItem>, SyncError>;

    /// Secondary source. `cached` lets paged sources skip items already known.
    async fn query_fallback(&self, cached: &[ProtocolItem]) -> Result<Vec<ProtocolItem>, SyncError>;

    fn lp_token_hints(&self) -> TokenHints {
        TokenHints::default()
    }

    fn gauge_hints(&self, _lp_token: &EvmToken) -> TokenHints {
        TokenHints::default()
    }
}
