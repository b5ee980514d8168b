// Initialize configuration
// Set up logging
// Create database connection pool
// Create shared state
// Run one protocol cache refresh and report the outcome

use protocol_cache_service::{
    config::Config, db, state::AppState, sync::CurveIntegration, ChainQuery, SyncOutcome,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting protocol-cache-service");

    let config = Config::from_env();
    tracing::info!("Configuration loaded: {:?}", config);

    let db_pool = db::connection::establish_connection(&config.database_url).await?;
    tracing::info!("Database connection established");

    let state = AppState::initialize(config, db_pool)?;
    let chain: Arc<dyn ChainQuery> = state.rpc_client.clone();
    let curve = CurveIntegration::new(&state.config, chain)?;

    match state
        .syncer()
        .ensure_cache_data_is_updated(&curve, state.config.force_refresh)
        .await
    {
        Ok(SyncOutcome::Fresh { cached }) => {
            tracing::info!("Curve cache is fresh with {} pools", cached.len())
        }
        Ok(SyncOutcome::Unchanged { cached }) => {
            tracing::info!("Curve pool count unchanged at {}", cached.len())
        }
        Ok(SyncOutcome::Refreshed { total, new, skipped }) => tracing::info!(
            "Curve cache refreshed: {} pools, {} new, {} skipped",
            total,
            new,
            skipped
        ),
        Err(e) => {
            tracing::error!("Curve cache refresh failed: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
