//! General (multi value) and unique (single value) cache tables.
//!
//! The free functions take a connection so they can run on a pooled
//! connection or inside an open transaction. `CacheStore` wraps the pool for
//! one-off calls.

use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::debug;

use super::keys::{compute_cache_key, CacheKey, CacheType, KeySegment};
use crate::models::Timestamp;

// Prefix matching uses substr rather than LIKE: tag names contain `_`, which
// LIKE treats as a wildcard.

pub async fn set_general_values<S: AsRef<str>>(
    conn: &mut SqliteConnection,
    key: &CacheKey,
    values: &[S],
    timestamp: Timestamp,
) -> Result<(), sqlx::Error> {
    for value in values {
        sqlx::query(
            r#"INSERT INTO general_cache (key, value, last_queried_ts) VALUES (?, ?, ?)
               ON CONFLICT(key, value) DO UPDATE SET last_queried_ts = excluded.last_queried_ts"#,
        )
        .bind(key.as_str())
        .bind(value.as_ref())
        .bind(timestamp)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn get_general_values(
    conn: &mut SqliteConnection,
    key: &CacheKey,
) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query("SELECT value FROM general_cache WHERE key = ?")
        .bind(key.as_str())
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(|row| row.try_get("value")).collect()
}

/// All (key, value) pairs whose key starts with `prefix`, ordered by key.
pub async fn get_general_values_like(
    conn: &mut SqliteConnection,
    prefix: &CacheKey,
) -> Result<Vec<(CacheKey, String)>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT key, value FROM general_cache
           WHERE substr(key, 1, length(?)) = ?
           ORDER BY key, value"#,
    )
    .bind(prefix.as_str())
    .bind(prefix.as_str())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| {
            let key: String = row.try_get("key")?;
            let value: String = row.try_get("value")?;
            Ok((CacheKey::from_stored(key), value))
        })
        .collect()
}

/// Delete every row of `key`, or only the rows holding one of `values`.
pub async fn delete_general_values(
    conn: &mut SqliteConnection,
    key: &CacheKey,
    values: Option<&[String]>,
) -> Result<u64, sqlx::Error> {
    let deleted = match values {
        None => sqlx::query("DELETE FROM general_cache WHERE key = ?")
            .bind(key.as_str())
            .execute(&mut *conn)
            .await?
            .rows_affected(),
        Some(values) => {
            let mut deleted = 0;
            for value in values {
                deleted += sqlx::query("DELETE FROM general_cache WHERE key = ? AND value = ?")
                    .bind(key.as_str())
                    .bind(value)
                    .execute(&mut *conn)
                    .await?
                    .rows_affected();
            }
            deleted
        }
    };
    Ok(deleted)
}

pub async fn delete_general_values_like(
    conn: &mut SqliteConnection,
    prefix: &CacheKey,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM general_cache WHERE substr(key, 1, length(?)) = ?")
        .bind(prefix.as_str())
        .bind(prefix.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn set_unique_value(
    conn: &mut SqliteConnection,
    key: &CacheKey,
    value: &str,
    timestamp: Timestamp,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO unique_cache (key, value, last_queried_ts) VALUES (?, ?, ?)
           ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                          last_queried_ts = excluded.last_queried_ts"#,
    )
    .bind(key.as_str())
    .bind(value)
    .bind(timestamp)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_unique_value(
    conn: &mut SqliteConnection,
    key: &CacheKey,
) -> Result<Option<String>, sqlx::Error> {
    let row = sqlx::query("SELECT value FROM unique_cache WHERE key = ?")
        .bind(key.as_str())
        .fetch_optional(&mut *conn)
        .await?;

    row.map(|row| row.try_get("value")).transpose()
}

pub async fn delete_unique_values_like(
    conn: &mut SqliteConnection,
    prefix: &CacheKey,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM unique_cache WHERE substr(key, 1, length(?)) = ?")
        .bind(prefix.as_str())
        .bind(prefix.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Move the timestamp of every row under `[cache_type, suffix..]` in both
/// tables to `timestamp`. Values are left untouched.
pub async fn bump_last_queried_ts(
    conn: &mut SqliteConnection,
    cache_type: CacheType,
    suffix: &[KeySegment],
    timestamp: Timestamp,
) -> Result<u64, sqlx::Error> {
    let mut segments = Vec::with_capacity(suffix.len() + 1);
    segments.push(KeySegment::Tag(cache_type));
    segments.extend_from_slice(suffix);
    let prefix = compute_cache_key(&segments);

    let mut bumped = 0;
    for table in ["general_cache", "unique_cache"] {
        let sql = format!(
            "UPDATE {} SET last_queried_ts = ? WHERE substr(key, 1, length(?)) = ?",
            table
        );
        bumped += sqlx::query(&sql)
            .bind(timestamp)
            .bind(prefix.as_str())
            .bind(prefix.as_str())
            .execute(&mut *conn)
            .await?
            .rows_affected();
    }

    debug!("Bumped last queried ts of {} rows under {}", bumped, prefix);
    Ok(bumped)
}

/// Latest timestamp across both tables for keys starting with `prefix`, or 0.
pub async fn get_last_queried_ts(
    conn: &mut SqliteConnection,
    prefix: &CacheKey,
) -> Result<Timestamp, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT MAX(ts) AS last_ts FROM (
               SELECT last_queried_ts AS ts FROM general_cache WHERE substr(key, 1, length(?)) = ?
               UNION ALL
               SELECT last_queried_ts AS ts FROM unique_cache WHERE substr(key, 1, length(?)) = ?
           )"#,
    )
    .bind(prefix.as_str())
    .bind(prefix.as_str())
    .bind(prefix.as_str())
    .bind(prefix.as_str())
    .fetch_one(&mut *conn)
    .await?;

    let last_ts: Option<Timestamp> = row.try_get("last_ts")?;
    Ok(last_ts.unwrap_or(0))
}

/// Pool backed handle to the cache tables.
#[derive(Clone)]
pub struct CacheStore {
    pool: SqlitePool,
}

impl CacheStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a transaction for a multi-statement atomic write. Readers keep
    /// seeing the previous contents until it commits.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn set_general_values<S: AsRef<str>>(
        &self,
        key: &CacheKey,
        values: &[S],
        timestamp: Timestamp,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        set_general_values(&mut tx, key, values, timestamp).await?;
        tx.commit().await
    }

    pub async fn get_general_values(&self, key: &CacheKey) -> Result<Vec<String>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        get_general_values(&mut conn, key).await
    }

    pub async fn get_general_values_like(
        &self,
        prefix: &CacheKey,
    ) -> Result<Vec<(CacheKey, String)>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        get_general_values_like(&mut conn, prefix).await
    }

    pub async fn delete_general_values(
        &self,
        key: &CacheKey,
        values: Option<&[String]>,
    ) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let deleted = delete_general_values(&mut tx, key, values).await?;
        tx.commit().await?;
        Ok(deleted)
    }

    pub async fn set_unique_value(
        &self,
        key: &CacheKey,
        value: &str,
        timestamp: Timestamp,
    ) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        set_unique_value(&mut conn, key, value, timestamp).await
    }

    pub async fn get_unique_value(&self, key: &CacheKey) -> Result<Option<String>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        get_unique_value(&mut conn, key).await
    }

    pub async fn bump_last_queried_ts(
        &self,
        cache_type: CacheType,
        suffix: &[KeySegment],
        timestamp: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let bumped = bump_last_queried_ts(&mut tx, cache_type, suffix, timestamp).await?;
        tx.commit().await?;
        Ok(bumped)
    }

    pub async fn get_last_queried_ts(&self, prefix: &CacheKey) -> Result<Timestamp, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        get_last_queried_ts(&mut conn, prefix).await
    }
}
