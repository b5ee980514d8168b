// Human readable labels for addresses discovered by protocol syncs.
// Separate from the cache tables: labels survive cache refreshes.

use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::models::{AddressbookEntry, ChainId, EvmAddress};

pub async fn add_or_update_addressbook_entries(
    pool: &SqlitePool,
    entries: &[AddressbookEntry],
) -> Result<(), sqlx::Error> {
    if entries.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for entry in entries {
        sqlx::query(
            r#"INSERT INTO address_book (address, blockchain, name) VALUES (?, ?, ?)
               ON CONFLICT(address, blockchain) DO UPDATE SET name = excluded.name"#,
        )
        .bind(entry.address.to_string())
        .bind(entry.blockchain.serialize_for_db())
        .bind(&entry.name)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    debug!("Stored {} addressbook entries", entries.len());
    Ok(())
}

pub async fn get_addressbook_name(
    pool: &SqlitePool,
    address: &EvmAddress,
    blockchain: ChainId,
) -> Result<Option<String>, sqlx::Error> {
    let row = sqlx::query("SELECT name FROM address_book WHERE address = ? AND blockchain = ?")
        .bind(address.to_string())
        .bind(blockchain.serialize_for_db())
        .fetch_optional(pool)
        .await?;

    row.map(|row| row.try_get("name")).transpose()
}
