// Persistence of canonical token records:
// - get_evm_token(conn, identifier) -> Result<EvmToken>   (UnknownAsset / MalformedCacheData)
// - asset_exists(conn, identifier) -> Result<bool>          (any asset row, token or not)
// - add_evm_token / edit_evm_token                          (run inside the caller's transaction)
// - add_user_asset / add_ignored_asset                      (the owning user's asset index)

use sqlx::{Row, SqliteConnection};

use crate::assets::AssetError;
use crate::models::{
    evm_address_to_identifier, ChainId, EvmAddress, EvmToken, EvmTokenKind, UnderlyingToken,
};

pub const EVM_TOKEN_ASSET_TYPE: &str = "evm_token";

pub async fn get_evm_token(
    conn: &mut SqliteConnection,
    identifier: &str,
) -> Result<EvmToken, AssetError> {
    let row = sqlx::query(
        r#"SELECT identifier, chain_id, address, token_kind, name, symbol, decimals, protocol
           FROM evm_tokens WHERE identifier = ?"#,
    )
    .bind(identifier)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AssetError::UnknownAsset(identifier.to_string()))?;

    let malformed = |what: &str| AssetError::MalformedCacheData(format!("{} of {}", what, identifier));

    let chain_id: i64 = row.try_get("chain_id")?;
    let address: String = row.try_get("address")?;
    let token_kind: String = row.try_get("token_kind")?;
    let decimals: Option<i64> = row.try_get("decimals")?;

    let chain_id = u64::try_from(chain_id).map_err(|_| malformed("chain_id"))?;
    let address: EvmAddress = address.parse().map_err(|_| malformed("address"))?;
    let token_kind: EvmTokenKind = token_kind.parse().map_err(|_| malformed("token_kind"))?;
    let decimals = decimals
        .and_then(|d| u8::try_from(d).ok())
        .ok_or_else(|| malformed("decimals"))?;

    let underlying_rows = sqlx::query(
        "SELECT address, token_kind, weight FROM underlying_tokens WHERE parent_identifier = ? ORDER BY rowid",
    )
    .bind(identifier)
    .fetch_all(&mut *conn)
    .await?;

    let mut underlying_tokens = Vec::with_capacity(underlying_rows.len());
    for underlying in underlying_rows {
        let u_address: String = underlying.try_get("address")?;
        let u_kind: String = underlying.try_get("token_kind")?;
        underlying_tokens.push(UnderlyingToken {
            address: u_address.parse().map_err(|_| malformed("underlying address"))?,
            token_kind: u_kind.parse().map_err(|_| malformed("underlying token_kind"))?,
            weight: underlying.try_get("weight")?,
        });
    }

    Ok(EvmToken {
        identifier: row.try_get("identifier")?,
        chain_id: ChainId(chain_id),
        address,
        token_kind,
        name: row.try_get("name")?,
        symbol: row.try_get("symbol")?,
        decimals,
        protocol: row.try_get("protocol")?,
        underlying_tokens,
    })
}

pub async fn asset_exists(conn: &mut SqliteConnection, identifier: &str) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT identifier FROM assets WHERE identifier = ?")
        .bind(identifier)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.is_some())
}

/// Insert a brand new token. Fails if any row already uses the identifier.
pub async fn add_evm_token(conn: &mut SqliteConnection, token: &EvmToken) -> Result<(), AssetError> {
    check_identifier(token)?;

    sqlx::query("INSERT INTO assets (identifier, asset_type) VALUES (?, ?)")
        .bind(&token.identifier)
        .bind(EVM_TOKEN_ASSET_TYPE)
        .execute(&mut *conn)
        .await
        .map_err(|e| AssetError::Input(format!("Failed to add asset {}: {}", token.identifier, e)))?;

    insert_token_details(conn, token).await
}

/// Overwrite the stored details of a token in place. The asset row may exist
/// as a non-token asset, in which case it becomes a token.
pub async fn edit_evm_token(conn: &mut SqliteConnection, token: &EvmToken) -> Result<(), AssetError> {
    check_identifier(token)?;

    sqlx::query(
        r#"INSERT INTO assets (identifier, asset_type) VALUES (?, ?)
           ON CONFLICT(identifier) DO UPDATE SET asset_type = excluded.asset_type"#,
    )
    .bind(&token.identifier)
    .bind(EVM_TOKEN_ASSET_TYPE)
    .execute(&mut *conn)
    .await
    .map_err(|e| AssetError::Input(format!("Failed to edit asset {}: {}", token.identifier, e)))?;

    sqlx::query("DELETE FROM evm_tokens WHERE identifier = ?")
        .bind(&token.identifier)
        .execute(&mut *conn)
        .await
        .map_err(|e| AssetError::Input(format!("Failed to edit token {}: {}", token.identifier, e)))?;

    insert_token_details(conn, token).await
}

pub async fn add_user_asset(conn: &mut SqliteConnection, identifier: &str) -> Result<(), AssetError> {
    sqlx::query("INSERT INTO user_assets (identifier) VALUES (?) ON CONFLICT(identifier) DO NOTHING")
        .bind(identifier)
        .execute(&mut *conn)
        .await
        .map_err(|e| AssetError::Input(format!("Failed to register user asset {}: {}", identifier, e)))?;
    Ok(())
}

pub async fn add_ignored_asset(conn: &mut SqliteConnection, identifier: &str) -> Result<(), AssetError> {
    sqlx::query("INSERT INTO ignored_assets (identifier) VALUES (?) ON CONFLICT(identifier) DO NOTHING")
        .bind(identifier)
        .execute(&mut *conn)
        .await
        .map_err(|e| AssetError::Input(format!("Failed to ignore asset {}: {}", identifier, e)))?;
    Ok(())
}

pub async fn is_ignored_asset(conn: &mut SqliteConnection, identifier: &str) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT identifier FROM ignored_assets WHERE identifier = ?")
        .bind(identifier)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.is_some())
}

fn check_identifier(token: &EvmToken) -> Result<(), AssetError> {
    let expected = evm_address_to_identifier(&token.address, token.chain_id, token.token_kind);
    if token.identifier != expected {
        return Err(AssetError::InvalidEdit(format!(
            "Token identifier {} does not match its address, chain and kind ({})",
            token.identifier, expected
        )));
    }
    Ok(())
}

async fn insert_token_details(conn: &mut SqliteConnection, token: &EvmToken) -> Result<(), AssetError> {
    let write_err = |e: sqlx::Error| AssetError::Input(format!("Failed to write token {}: {}", token.identifier, e));

    sqlx::query(
        r#"INSERT INTO evm_tokens
           (identifier, chain_id, address, token_kind, name, symbol, decimals, protocol)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&token.identifier)
    .bind(token.chain_id.0 as i64)
    .bind(token.address.to_string())
    .bind(token.token_kind.as_str())
    .bind(&token.name)
    .bind(&token.symbol)
    .bind(token.decimals as i64)
    .bind(&token.protocol)
    .execute(&mut *conn)
    .await
    .map_err(write_err)?;

    for underlying in &token.underlying_tokens {
        sqlx::query(
            r#"INSERT INTO underlying_tokens (parent_identifier, address, token_kind, weight)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(parent_identifier, address, token_kind) DO UPDATE SET weight = excluded.weight"#,
        )
        .bind(&token.identifier)
        .bind(underlying.address.to_string())
        .bind(underlying.token_kind.as_str())
        .bind(underlying.weight)
        .execute(&mut *conn)
        .await
        .map_err(write_err)?;
    }

    Ok(())
}
