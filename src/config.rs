// Configuration for:
// - Database connection string
// - Chain RPC endpoint and timeout
// - Curve API endpoint and timeout
// - Protocol cache refresh interval and on-chain paging
// - In-memory token cache and notifier settings

use dotenv::dotenv;
use std::env;
use std::time::Duration;

use crate::models::ChainId;
use crate::validation::validate_chain_id;

pub const DEFAULT_CURVE_API_URL: &str = "https://api.curve.finance/v1/getPools/all/{chain}";

/// One week
pub const DEFAULT_PROTOCOL_CACHE_REFRESH_SECS: u64 = 60 * 60 * 24 * 7;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub rpc_url: String,
    pub rpc_timeout: Duration,
    pub chain_id: ChainId,
    pub curve_api_url: String,
    pub api_timeout: Duration,
    pub protocol_cache_refresh: Duration,
    pub onchain_page_size: usize,
    pub token_cache_capacity: u64,
    pub token_cache_ttl: Duration,
    pub notifier_capacity: usize,
    pub force_refresh: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:protocol_cache.db".to_string(),
            rpc_url: "https://ethereum-rpc.publicnode.com".to_string(),
            rpc_timeout: Duration::from_secs(30),
            chain_id: ChainId::ETHEREUM,
            curve_api_url: DEFAULT_CURVE_API_URL.to_string(),
            api_timeout: Duration::from_secs(30),
            protocol_cache_refresh: Duration::from_secs(DEFAULT_PROTOCOL_CACHE_REFRESH_SECS),
            onchain_page_size: 50,
            token_cache_capacity: 10_000,
            token_cache_ttl: Duration::from_secs(3600),
            notifier_capacity: 256,
            force_refresh: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();
        let defaults = Self::default();

        let database_url = env::var("DATABASE_URL").unwrap_or(defaults.database_url);
        let rpc_url = env::var("RPC_URL").unwrap_or(defaults.rpc_url);
        let rpc_timeout = env::var("RPC_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.rpc_timeout);
        let chain_id = env::var("CHAIN_ID")
            .ok()
            .and_then(|v| validate_chain_id(&v).ok())
            .map(ChainId)
            .unwrap_or(defaults.chain_id);
        let curve_api_url = env::var("CURVE_API_URL").unwrap_or(defaults.curve_api_url);
        let api_timeout = env::var("API_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.api_timeout);
        let protocol_cache_refresh = env::var("PROTOCOL_CACHE_REFRESH_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.protocol_cache_refresh);
        let onchain_page_size = env::var("ONCHAIN_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|size: &usize| *size > 0)
            .unwrap_or(defaults.onchain_page_size);
        let token_cache_capacity = env::var("TOKEN_CACHE_CAPACITY")
            .map(|v| v.parse().unwrap_or(defaults.token_cache_capacity))
            .unwrap_or(defaults.token_cache_capacity);
        let token_cache_ttl = env::var("TOKEN_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.token_cache_ttl);
        let notifier_capacity = env::var("NOTIFIER_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|capacity: &usize| *capacity > 0)
            .unwrap_or(defaults.notifier_capacity);
        let force_refresh = env::var("FORCE_REFRESH")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            database_url,
            rpc_url,
            rpc_timeout,
            chain_id,
            curve_api_url,
            api_timeout,
            protocol_cache_refresh,
            onchain_page_size,
            token_cache_capacity,
            token_cache_ttl,
            notifier_capacity,
            force_refresh,
        }
    }
}
