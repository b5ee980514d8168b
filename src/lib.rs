pub mod assets;
pub mod blockchain;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod notifier;
pub mod state;
pub mod sync;
pub mod validation;

#[cfg(test)]
pub mod tests;

// Re-export specific items for convenience
pub use assets::{AssetError, TokenHints, TokenResolver};
pub use blockchain::{ChainError, ChainQuery, RpcClient};
pub use cache::{compute_cache_key, CacheKey, CacheStore, CacheType, KeySegment};
pub use db::connection;
pub use db::migration;
pub use models::{ChainId, EvmAddress, EvmToken, EvmTokenKind, TokenEncounterInfo};
pub use notifier::{Notifier, WsMessage};
pub use sync::{ProtocolIntegration, ProtocolSyncer, SyncError, SyncOutcome};
pub use validation::{validate_evm_address, ValidationError};
