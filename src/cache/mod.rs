pub mod freshness;
pub mod keys;
pub mod store;
pub mod tokens;

pub use freshness::should_refresh;
pub use keys::{compute_cache_key, CacheKey, CacheType, KeySegment};
pub use store::CacheStore;
pub use tokens::TokenCache;
