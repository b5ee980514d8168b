//! Shared fixtures: in-memory database, resolver wiring and mock collaborators

mod curve_tests;
mod freshness_tests;

use alloy::primitives::Bytes;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::assets::TokenResolver;
use crate::blockchain::{CallResult, ChainError, ChainQuery, ContractCall, Erc20Info, Erc721Info};
use crate::cache::{CacheType, TokenCache};
use crate::db::connection::establish_memory_connection;
use crate::models::{ChainId, EvmAddress};
use crate::notifier::{Notifier, WsMessage};
use crate::sync::{ProtocolIntegration, ProtocolItem, SyncCacheTypes, SyncError, TokenRef};

pub fn address(n: u32) -> EvmAddress {
    format!("0x{:040x}", n).parse().unwrap()
}

pub async fn setup_pool() -> SqlitePool {
    establish_memory_connection()
        .await
        .expect("Failed to open in-memory database")
}

pub fn new_resolver(pool: &SqlitePool) -> Arc<TokenResolver> {
    Arc::new(TokenResolver::new(
        pool.clone(),
        TokenCache::new(1_000, Duration::from_secs(60)),
        Notifier::new(64),
    ))
}

pub fn drain(receiver: &mut broadcast::Receiver<WsMessage>) -> Vec<WsMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = receiver.try_recv() {
        messages.push(message);
    }
    messages
}

pub fn erc20(name: &str, symbol: &str, decimals: u8) -> Erc20Info {
    Erc20Info {
        decimals: Some(decimals),
        symbol: Some(symbol.to_string()),
        name: Some(name.to_string()),
    }
}

/// Chain query answering from canned metadata. Unknown addresses return
/// empty metadata. Every query yields to the scheduler first so concurrent
/// callers interleave.
pub struct MockChain {
    chain_id: ChainId,
    erc20: HashMap<EvmAddress, Erc20Info>,
    erc721: HashMap<EvmAddress, Erc721Info>,
    failing: bool,
    pub metadata_queries: AtomicUsize,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            chain_id: ChainId::ETHEREUM,
            erc20: HashMap::new(),
            erc721: HashMap::new(),
            failing: false,
            metadata_queries: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new()
        }
    }

    pub fn with_erc20(mut self, address: EvmAddress, info: Erc20Info) -> Self {
        self.erc20.insert(address, info);
        self
    }

    pub fn with_erc721(mut self, address: EvmAddress, info: Erc721Info) -> Self {
        self.erc721.insert(address, info);
        self
    }

    pub fn queries(&self) -> usize {
        self.metadata_queries.load(Ordering::SeqCst)
    }

    async fn before_query(&self) -> Result<(), ChainError> {
        self.metadata_queries.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.failing {
            return Err(ChainError::InvalidResponse("node unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainQuery for MockChain {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn multicall(&self, _calls: &[ContractCall]) -> Result<Vec<CallResult>, ChainError> {
        Err(ChainError::InvalidResponse("multicall not mocked".to_string()))
    }

    async fn erc20_info(&self, address: &EvmAddress) -> Result<Erc20Info, ChainError> {
        self.before_query().await?;
        Ok(self.erc20.get(address).cloned().unwrap_or_default())
    }

    async fn erc721_info(&self, address: &EvmAddress) -> Result<Erc721Info, ChainError> {
        self.before_query().await?;
        Ok(self.erc721.get(address).cloned().unwrap_or_default())
    }
}

/// Chain answering each call from scripted return data, matched on target
/// and calldata. Unscripted calls revert.
pub struct ScriptedChain {
    responses: HashMap<(EvmAddress, Bytes), CallResult>,
    pub batches: AtomicUsize,
}

impl ScriptedChain {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            batches: AtomicUsize::new(0),
        }
    }

    pub fn returning<C: SolCall>(mut self, target: &EvmAddress, call: C, data: impl Into<Bytes>) -> Self {
        let call = ContractCall::new(target, &call);
        self.responses.insert(
            (call.target, call.data),
            CallResult {
                success: true,
                data: data.into(),
            },
        );
        self
    }
}

#[async_trait]
impl ChainQuery for ScriptedChain {
    fn chain_id(&self) -> ChainId {
        ChainId::ETHEREUM
    }

    async fn multicall(&self, calls: &[ContractCall]) -> Result<Vec<CallResult>, ChainError> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        Ok(calls
            .iter()
            .map(|call| {
                self.responses
                    .get(&(call.target.clone(), call.data.clone()))
                    .cloned()
                    .unwrap_or_default()
            })
            .collect())
    }
}

pub fn curve_cache_types() -> SyncCacheTypes {
    SyncCacheTypes {
        items: CacheType::CurvePoolAddress,
        item_tokens: CacheType::CurvePoolTokens,
        lp_tokens: CacheType::CurveLpTokens,
        gauges: CacheType::CurveGaugeAddress,
    }
}

pub fn pool_item(pool: u32, tokens: &[u32]) -> ProtocolItem {
    ProtocolItem {
        address: address(pool),
        label: Some(format!("pool {}", pool)),
        tokens: tokens.iter().map(|t| TokenRef::plain(address(*t))).collect(),
        lp_token: None,
        gauge: None,
    }
}

/// Integration with scripted sources. `None` makes a source fail.
pub struct MockIntegration {
    pub chain: Arc<MockChain>,
    pub primary: Option<Vec<ProtocolItem>>,
    pub fallback: Option<Vec<ProtocolItem>>,
    pub count: Option<usize>,
    pub primary_calls: AtomicUsize,
    pub fallback_calls: AtomicUsize,
    pub fallback_saw: Mutex<Vec<EvmAddress>>,
}

impl MockIntegration {
    pub fn new(chain: MockChain) -> Self {
        Self {
            chain: Arc::new(chain),
            primary: None,
            fallback: None,
            count: None,
            primary_calls: AtomicUsize::new(0),
            fallback_calls: AtomicUsize::new(0),
            fallback_saw: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ProtocolIntegration for MockIntegration {
    fn protocol(&self) -> &str {
        "mock"
    }

    fn display_name(&self) -> &str {
        "Mock"
    }

    fn chain_id(&self) -> ChainId {
        ChainId::ETHEREUM
    }

    fn cache_types(&self) -> SyncCacheTypes {
        curve_cache_types()
    }

    fn chain_query(&self) -> Option<&dyn ChainQuery> {
        Some(self.chain.as_ref())
    }

    async fn remote_count(&self) -> Result<Option<usize>, SyncError> {
        Ok(self.count)
    }

    async fn query_primary(&self) -> Result<Vec<ProtocolItem>, SyncError> {
        self.primary_calls.fetch_add(1, Ordering::SeqCst);
        self.primary
            .clone()
            .ok_or_else(|| SyncError::Remote("api down".to_string()))
    }

    async fn query_fallback(&self, cached: &[ProtocolItem]) -> Result<Vec<ProtocolItem>, SyncError> {
        self.fallback_calls.fetch_add(1, Ordering::SeqCst);
        *self.fallback_saw.lock().unwrap() = cached.iter().map(|item| item.address.clone()).collect();
        self.fallback
            .clone()
            .ok_or_else(|| SyncError::Remote("node down".to_string()))
    }
}
