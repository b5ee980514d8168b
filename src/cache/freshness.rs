use sqlx::SqliteConnection;
use std::time::Duration;
use tracing::debug;

use super::keys::{compute_cache_key, CacheType, KeySegment};
use super::store::{get_last_queried_ts, CacheStore};
use crate::models::{ts_now, Timestamp};

/// Pure staleness rule. A zero timestamp means nothing was ever cached.
pub fn is_stale(last_queried_ts: Timestamp, now: Timestamp, refresh_interval: Duration) -> bool {
    if last_queried_ts == 0 {
        return true;
    }
    let interval = i64::try_from(refresh_interval.as_secs()).unwrap_or(i64::MAX);
    now.saturating_sub(last_queried_ts) >= interval
}

pub async fn should_refresh(
    conn: &mut SqliteConnection,
    cache_type: CacheType,
    key_args: &[KeySegment],
    refresh_interval: Duration,
    force_refresh: bool,
) -> Result<bool, sqlx::Error> {
    if force_refresh {
        return Ok(true);
    }

    let mut segments = Vec::with_capacity(key_args.len() + 1);
    segments.push(KeySegment::Tag(cache_type));
    segments.extend_from_slice(key_args);
    let prefix = compute_cache_key(&segments);

    let last_queried_ts = get_last_queried_ts(conn, &prefix).await?;
    let stale = is_stale(last_queried_ts, ts_now(), refresh_interval);
    debug!(
        "Cache {} last queried at {}, stale: {}",
        prefix, last_queried_ts, stale
    );
    Ok(stale)
}

impl CacheStore {
    pub async fn should_refresh(
        &self,
        cache_type: CacheType,
        key_args: &[KeySegment],
        refresh_interval: Duration,
        force_refresh: bool,
    ) -> Result<bool, sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        should_refresh(&mut conn, cache_type, key_args, refresh_interval, force_refresh).await
    }
}
