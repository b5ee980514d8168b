//! Curve pools, gauges and LP tokens.
//!
//! The Curve API is the primary source. When it is down the pools are
//! enumerated from the on-chain metaregistry, one multicall per page.

use alloy::primitives::{address, Address, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ProtocolIntegration, ProtocolItem, SyncCacheTypes, SyncError, TokenRef};
use crate::assets::TokenHints;
use crate::blockchain::contracts::{ICurveAddressProvider, ICurveMetaRegistry};
use crate::blockchain::{decode_returns, CallResult, ChainError, ChainQuery, ContractCall};
use crate::cache::CacheType;
use crate::config::Config;
use crate::models::{ChainId, EvmAddress, EvmToken};

pub const CURVE_PROTOCOL: &str = "curve";
pub const CURVE_POOL_PROTOCOL: &str = "curve_pool";

/// Same address on every chain Curve is deployed on
pub const CURVE_ADDRESS_PROVIDER: Address = address!("0x0000000022d53366457f9d5e68ec105046fc4383");

/// Address provider slot of the metaregistry
const METAREGISTRY_ID: u64 = 7;

const GAUGE_DECIMALS: u8 = 18;

pub fn curve_chain_name(chain_id: ChainId) -> Option<&'static str> {
    match chain_id {
        ChainId::ETHEREUM => Some("ethereum"),
        ChainId::OPTIMISM => Some("optimism"),
        ChainId::BINANCE_SC => Some("bsc"),
        ChainId::GNOSIS => Some("xdai"),
        ChainId::POLYGON_POS => Some("polygon"),
        ChainId::BASE => Some("base"),
        ChainId::ARBITRUM_ONE => Some("arbitrum"),
        _ => None,
    }
}

fn parse_address(value: &Value, field: &str) -> Result<Option<EvmAddress>, SyncError> {
    match value.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => raw
            .parse::<EvmAddress>()
            .map(|address| (!address.is_zero()).then_some(address))
            .map_err(|e| SyncError::Remote(format!("invalid {}: {}", field, e))),
        Some(other) => Err(SyncError::Remote(format!("{} is not a string: {}", field, other))),
    }
}

fn parse_coins(value: &Value, field: &str) -> Result<Option<Vec<EvmAddress>>, SyncError> {
    let Some(coins) = value.get(field) else {
        return Ok(None);
    };
    let coins = coins
        .as_array()
        .ok_or_else(|| SyncError::Remote(format!("{} is not a list", field)))?;

    coins
        .iter()
        .map(|coin| {
            parse_address(coin, "address")?
                .ok_or_else(|| SyncError::Remote(format!("{} entry without address", field)))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Pair each coin with its underlying coin when the pool exposes a
/// one-to-one mapping that differs from the coins themselves.
fn pool_tokens(coins: Vec<EvmAddress>, underlying: Option<Vec<EvmAddress>>) -> Vec<TokenRef> {
    match underlying {
        Some(underlying) if underlying.len() == coins.len() && underlying != coins => coins
            .into_iter()
            .zip(underlying)
            .map(|(address, underlying)| TokenRef {
                address,
                underlying: Some(underlying),
            })
            .collect(),
        _ => coins.into_iter().map(TokenRef::plain).collect(),
    }
}

fn parse_api_pool(pool: &Value) -> Result<ProtocolItem, SyncError> {
    let address = parse_address(pool, "address")?
        .ok_or_else(|| SyncError::Remote("pool without address".to_string()))?;
    let lp_token = parse_address(pool, "lpTokenAddress")?
        .ok_or_else(|| SyncError::Remote(format!("pool {} has no lpTokenAddress", address)))?;
    let coins = parse_coins(pool, "coins")?
        .ok_or_else(|| SyncError::Remote(format!("pool {} has no coins", address)))?;
    let underlying = parse_coins(pool, "underlyingCoins")?;

    Ok(ProtocolItem {
        label: pool
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .map(str::to_string),
        gauge: parse_address(pool, "gaugeAddress")?,
        lp_token: Some(lp_token),
        tokens: pool_tokens(coins, underlying),
        address,
    })
}

/// Parse the body of the Curve `getPools` endpoint. A failed or malformed
/// response is an error; a single malformed pool is only skipped.
pub fn parse_curve_api_response(body: &Value) -> Result<Vec<ProtocolItem>, SyncError> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(SyncError::Remote(format!("Curve API returned failure: {}", body)));
    }

    let pools = body
        .get("data")
        .and_then(|data| data.get("poolData"))
        .and_then(Value::as_array)
        .ok_or_else(|| SyncError::Remote("Curve API response is missing data.poolData".to_string()))?;

    let mut items = Vec::with_capacity(pools.len());
    for pool in pools {
        match parse_api_pool(pool) {
            Ok(item) => items.push(item),
            Err(e) => warn!("Skipping Curve API pool: {}", e),
        }
    }
    Ok(items)
}

pub struct CurveIntegration {
    http: reqwest::Client,
    api_url: String,
    chain: Arc<dyn ChainQuery>,
    page_size: usize,
}

impl CurveIntegration {
    pub fn new(config: &Config, chain: Arc<dyn ChainQuery>) -> Result<Self, SyncError> {
        Self::with_endpoint(&config.curve_api_url, config.api_timeout, config.onchain_page_size, chain)
    }

    pub fn with_endpoint(
        api_url: &str,
        timeout: Duration,
        page_size: usize,
        chain: Arc<dyn ChainQuery>,
    ) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_url: api_url.to_string(),
            chain,
            page_size: page_size.max(1),
        })
    }

    async fn metaregistry(&self) -> Result<EvmAddress, SyncError> {
        let call = ICurveAddressProvider::get_addressCall {
            id: U256::from(METAREGISTRY_ID),
        };
        let provider = EvmAddress::from(CURVE_ADDRESS_PROVIDER);
        let data = self.chain.call(&ContractCall::new(&provider, &call)).await?;
        let metaregistry = ICurveAddressProvider::get_addressCall::abi_decode_returns(&data).map_err(ChainError::from)?;
        if metaregistry.is_zero() {
            return Err(SyncError::Remote(format!("no metaregistry on chain {}", self.chain_id())));
        }
        Ok(metaregistry.into())
    }

    async fn pool_count(&self, metaregistry: &EvmAddress) -> Result<usize, SyncError> {
        let data = self
            .chain
            .call(&ContractCall::new(metaregistry, &ICurveMetaRegistry::pool_countCall {}))
            .await?;
        let count = ICurveMetaRegistry::pool_countCall::abi_decode_returns(&data).map_err(ChainError::from)?;
        usize::try_from(count).map_err(|_| SyncError::Remote("pool count overflow".to_string()))
    }

    async fn pool_addresses(&self, metaregistry: &EvmAddress, count: usize) -> Result<Vec<EvmAddress>, SyncError> {
        let mut addresses = Vec::with_capacity(count);
        let indices: Vec<usize> = (0..count).collect();
        for page in indices.chunks(self.page_size) {
            let calls: Vec<ContractCall> = page
                .iter()
                .map(|index| ContractCall::new(metaregistry, &ICurveMetaRegistry::pool_listCall { i: U256::from(*index) }))
                .collect();
            for (index, result) in page.iter().zip(self.chain.multicall(&calls).await?) {
                match decode_returns::<ICurveMetaRegistry::pool_listCall>(&result) {
                    Some(address) if !address.is_zero() => addresses.push(address.into()),
                    _ => warn!("Could not read Curve pool at metaregistry index {}", index),
                }
            }
        }
        Ok(addresses)
    }

    async fn pool_details(&self, metaregistry: &EvmAddress, pools: &[EvmAddress]) -> Result<Vec<ProtocolItem>, SyncError> {
        let mut items = Vec::with_capacity(pools.len());
        for page in pools.chunks(self.page_size) {
            let calls: Vec<ContractCall> = page
                .iter()
                .flat_map(|pool| {
                    let pool = pool.address();
                    [
                        ContractCall::new(metaregistry, &ICurveMetaRegistry::get_pool_nameCall { pool }),
                        ContractCall::new(metaregistry, &ICurveMetaRegistry::get_gaugeCall { pool }),
                        ContractCall::new(metaregistry, &ICurveMetaRegistry::get_lp_tokenCall { pool }),
                        ContractCall::new(metaregistry, &ICurveMetaRegistry::get_coinsCall { pool }),
                        ContractCall::new(metaregistry, &ICurveMetaRegistry::get_underlying_coinsCall { pool }),
                    ]
                })
                .collect();
            let results = self.chain.multicall(&calls).await?;

            for (pool, properties) in page.iter().zip(results.chunks(5)) {
                match decode_pool_properties(pool, properties) {
                    Some(item) => items.push(item),
                    None => warn!("Failed to query properties of Curve pool {}. Skipping", pool),
                }
            }
        }
        Ok(items)
    }
}

/// Coin slots past the last coin hold the zero address.
fn nonzero(addresses: [Address; 8]) -> Vec<EvmAddress> {
    addresses
        .into_iter()
        .filter(|address| !address.is_zero())
        .map(EvmAddress::from)
        .collect()
}

/// `None` when any property other than the pool name could not be read.
fn decode_pool_properties(pool: &EvmAddress, properties: &[CallResult]) -> Option<ProtocolItem> {
    let [name, gauge, lp_token, coins, underlying] = properties else {
        return None;
    };

    // a number of newer pools revert on get_pool_name
    let label = decode_returns::<ICurveMetaRegistry::get_pool_nameCall>(name).filter(|name| !name.is_empty());
    let gauge = decode_returns::<ICurveMetaRegistry::get_gaugeCall>(gauge)?;
    let lp_token = decode_returns::<ICurveMetaRegistry::get_lp_tokenCall>(lp_token)?;
    let coins = nonzero(decode_returns::<ICurveMetaRegistry::get_coinsCall>(coins)?);
    let underlying = nonzero(decode_returns::<ICurveMetaRegistry::get_underlying_coinsCall>(underlying)?);

    Some(ProtocolItem {
        address: pool.clone(),
        label,
        tokens: pool_tokens(coins, (!underlying.is_empty()).then_some(underlying)),
        lp_token: (!lp_token.is_zero()).then(|| lp_token.into()),
        gauge: (!gauge.is_zero()).then(|| gauge.into()),
    })
}

#[async_trait]
impl ProtocolIntegration for CurveIntegration {
    fn protocol(&self) -> &str {
        CURVE_PROTOCOL
    }

    fn display_name(&self) -> &str {
        "Curve"
    }

    fn chain_id(&self) -> ChainId {
        self.chain.chain_id()
    }

    fn cache_types(&self) -> SyncCacheTypes {
        SyncCacheTypes {
            items: CacheType::CurvePoolAddress,
            item_tokens: CacheType::CurvePoolTokens,
            lp_tokens: CacheType::CurveLpTokens,
            gauges: CacheType::CurveGaugeAddress,
        }
    }

    fn chain_query(&self) -> Option<&dyn ChainQuery> {
        Some(self.chain.as_ref())
    }

    async fn remote_count(&self) -> Result<Option<usize>, SyncError> {
        let metaregistry = self.metaregistry().await?;
        Ok(Some(self.pool_count(&metaregistry).await?))
    }

    async fn query_primary(&self) -> Result<Vec<ProtocolItem>, SyncError> {
        let chain_id = self.chain_id();
        let chain_name = curve_chain_name(chain_id)
            .ok_or_else(|| SyncError::Remote(format!("Curve API does not cover chain {}", chain_id)))?;
        let url = self.api_url.replace("{chain}", chain_name);
        debug!("Querying Curve API {}", url);

        let body: Value = self.http.get(&url).send().await?.error_for_status()?.json().await?;
        parse_curve_api_response(&body)
    }

    async fn query_fallback(&self, cached: &[ProtocolItem]) -> Result<Vec<ProtocolItem>, SyncError> {
        let metaregistry = self.metaregistry().await?;
        let count = self.pool_count(&metaregistry).await?;
        let addresses = self.pool_addresses(&metaregistry, count).await?;

        let cached: HashMap<&EvmAddress, &ProtocolItem> = cached.iter().map(|item| (&item.address, item)).collect();
        let unknown: Vec<EvmAddress> = addresses
            .iter()
            .filter(|address| !cached.contains_key(address))
            .cloned()
            .collect();
        info!(
            "Curve metaregistry on chain {} lists {} pools, {} not cached yet",
            self.chain_id(),
            addresses.len(),
            unknown.len()
        );

        let mut details: HashMap<EvmAddress, ProtocolItem> = self
            .pool_details(&metaregistry, &unknown)
            .await?
            .into_iter()
            .map(|item| (item.address.clone(), item))
            .collect();

        Ok(addresses
            .iter()
            .filter_map(|address| match cached.get(address) {
                Some(item) => Some((*item).clone()),
                None => details.remove(address),
            })
            .collect())
    }

    fn lp_token_hints(&self) -> TokenHints {
        TokenHints {
            protocol: Some(CURVE_POOL_PROTOCOL.to_string()),
            ..TokenHints::default()
        }
    }

    /// Old gauges lack the metadata methods. They all use 18 decimals.
    fn gauge_hints(&self, lp_token: &EvmToken) -> TokenHints {
        TokenHints {
            fallback_name: Some(format!("{} Gauge Deposit", lp_token.name)),
            fallback_symbol: Some(format!("{}-gauge", lp_token.symbol.as_deref().unwrap_or_default())),
            fallback_decimals: Some(GAUGE_DECIMALS),
            ..TokenHints::default()
        }
    }
}
