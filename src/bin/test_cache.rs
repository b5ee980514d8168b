use protocol_cache_service::cache::{compute_cache_key, CacheStore, CacheType, TokenCache};
use protocol_cache_service::config::Config;
use protocol_cache_service::db::connection;
use protocol_cache_service::models::{ts_now, ChainId, EvmAddress, EvmTokenKind};
use protocol_cache_service::notifier::Notifier;
use protocol_cache_service::{TokenHints, TokenResolver};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    println!("Establishing database connection...");
    let pool = connection::establish_connection(&config.database_url).await?;
    println!("✅ Database connection established!");

    let store = CacheStore::new(pool.clone());
    let pool_address: EvmAddress = "0xbebc44782c7db0a1a60cb6fe97d0b483032ff1c7".parse()?;
    let key = compute_cache_key(&[CacheType::CurvePoolAddress.into(), ChainId::ETHEREUM.into()]);

    println!("Writing general cache entry...");
    store.set_general_values(&key, &[pool_address.to_string()], ts_now()).await?;
    let values = store.get_general_values(&key).await?;
    println!("✅ {} values under {}", values.len(), key);

    let last_ts = store.get_last_queried_ts(&key).await?;
    println!("✅ Last queried at {}", last_ts);

    println!("Resolving token without chain access...");
    let resolver = TokenResolver::new(
        pool,
        TokenCache::new(config.token_cache_capacity, config.token_cache_ttl),
        Notifier::new(config.notifier_capacity),
    );
    let dai: EvmAddress = "0x6b175474e89094c44da98b954eedeac495271d0f".parse()?;
    let token = resolver
        .resolve_or_create(
            ChainId::ETHEREUM,
            &dai,
            EvmTokenKind::Erc20,
            TokenHints {
                name: Some("Dai Stablecoin".to_string()),
                symbol: Some("DAI".to_string()),
                decimals: Some(18),
                ..TokenHints::default()
            },
            None,
            None,
        )
        .await?;
    println!("✅ Resolved {} ({})", token.identifier, token.name);

    println!("All checks completed successfully!");
    Ok(())
}
