pub mod addressbook;
pub mod connection;
pub mod migration;
pub mod tokens;

/// Schema statements, applied in order by `migration::run_migrations`.
pub const SCHEMA: &[&str] = &[
    // Multi-value cache: set semantics per key
    r#"CREATE TABLE IF NOT EXISTS general_cache (
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        last_queried_ts INTEGER NOT NULL,
        PRIMARY KEY (key, value)
    )"#,
    // Single-value cache: writes overwrite
    r#"CREATE TABLE IF NOT EXISTS unique_cache (
        key TEXT NOT NULL PRIMARY KEY,
        value TEXT NOT NULL,
        last_queried_ts INTEGER NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS assets (
        identifier TEXT NOT NULL PRIMARY KEY,
        asset_type TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS evm_tokens (
        identifier TEXT NOT NULL PRIMARY KEY,
        chain_id INTEGER NOT NULL,
        address TEXT NOT NULL,
        token_kind TEXT NOT NULL,
        name TEXT NOT NULL,
        symbol TEXT,
        decimals INTEGER,
        protocol TEXT,
        FOREIGN KEY (identifier) REFERENCES assets(identifier) ON UPDATE CASCADE ON DELETE CASCADE
    )"#,
    r#"CREATE TABLE IF NOT EXISTS underlying_tokens (
        parent_identifier TEXT NOT NULL,
        address TEXT NOT NULL,
        token_kind TEXT NOT NULL,
        weight REAL NOT NULL,
        PRIMARY KEY (parent_identifier, address, token_kind),
        FOREIGN KEY (parent_identifier) REFERENCES evm_tokens(identifier) ON UPDATE CASCADE ON DELETE CASCADE
    )"#,
    r#"CREATE TABLE IF NOT EXISTS user_assets (
        identifier TEXT NOT NULL PRIMARY KEY
    )"#,
    r#"CREATE TABLE IF NOT EXISTS ignored_assets (
        identifier TEXT NOT NULL PRIMARY KEY
    )"#,
    r#"CREATE TABLE IF NOT EXISTS address_book (
        address TEXT NOT NULL,
        blockchain TEXT NOT NULL,
        name TEXT NOT NULL,
        PRIMARY KEY (address, blockchain)
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_evm_tokens_chain_address ON evm_tokens(chain_id, address)",
    "CREATE INDEX IF NOT EXISTS idx_unique_cache_value ON unique_cache(value)",
];
