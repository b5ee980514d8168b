use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::errors::AssetError;
use super::spam::is_spam_token;
use crate::blockchain::ChainQuery;
use crate::cache::TokenCache;
use crate::db::tokens::{add_evm_token, add_ignored_asset, add_user_asset, asset_exists, edit_evm_token, get_evm_token};
use crate::models::{
    evm_address_to_identifier, ChainId, EvmAddress, EvmToken, EvmTokenKind, TokenEncounterInfo,
    UnderlyingToken, SPAM_PROTOCOL,
};
use crate::notifier::{Notifier, WsMessage};

/// Caller supplied metadata. Hints take precedence over on-chain values for
/// new tokens. Fallbacks are only used, all three together, when on-chain
/// metadata is incomplete.
#[derive(Debug, Clone, Default)]
pub struct TokenHints {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
    pub protocol: Option<String>,
    pub underlying_tokens: Option<Vec<UnderlyingToken>>,
    pub fallback_name: Option<String>,
    pub fallback_symbol: Option<String>,
    pub fallback_decimals: Option<u8>,
}

impl TokenHints {
    fn fallbacks(&self) -> Option<(String, String, u8)> {
        Some((
            self.fallback_name.clone()?,
            self.fallback_symbol.clone()?,
            self.fallback_decimals?,
        ))
    }
}

#[derive(Debug, Default)]
struct Metadata {
    name: Option<String>,
    symbol: Option<String>,
    decimals: Option<u8>,
}

impl Metadata {
    fn is_complete(&self) -> bool {
        self.name.is_some() && self.symbol.is_some() && self.decimals.is_some()
    }
}

/// Resolves addresses to canonical token records, creating them at most once.
///
/// One resolver exists per user database. Its lock covers the whole
/// read-decide-write sequence of a call, chain queries included, so
/// concurrent callers for the same new address see exactly one creation.
pub struct TokenResolver {
    pool: SqlitePool,
    lock: Mutex<()>,
    tokens: TokenCache,
    notifier: Notifier,
}

impl TokenResolver {
    pub fn new(pool: SqlitePool, tokens: TokenCache, notifier: Notifier) -> Self {
        Self {
            pool,
            lock: Mutex::new(()),
            tokens,
            notifier,
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Look a token up without creating it.
    pub async fn get_token(&self, identifier: &str) -> Result<Arc<EvmToken>, AssetError> {
        if let Some(token) = self.tokens.get(identifier).await {
            return Ok(token);
        }

        let token = {
            let mut conn = self.pool.acquire().await?;
            Arc::new(get_evm_token(&mut conn, identifier).await?)
        };
        self.tokens.insert(token.clone()).await;
        Ok(token)
    }

    pub async fn resolve_or_create(
        &self,
        chain_id: ChainId,
        address: &EvmAddress,
        token_kind: EvmTokenKind,
        hints: TokenHints,
        chain_query: Option<&dyn ChainQuery>,
        encounter: Option<TokenEncounterInfo>,
    ) -> Result<Arc<EvmToken>, AssetError> {
        let identifier = evm_address_to_identifier(address, chain_id, token_kind);
        let _guard = self.lock.lock().await;

        match self.get_token(&identifier).await {
            Ok(existing) => return self.backfill_existing(existing, &hints, chain_query).await,
            Err(AssetError::UnknownAsset(_)) | Err(AssetError::MalformedCacheData(_)) => {}
            Err(e) => return Err(e),
        }

        // The identifier may already be taken by an asset that is not a token yet
        let exists = {
            let mut conn = self.pool.acquire().await?;
            asset_exists(&mut conn, &identifier).await?
        };

        let mut metadata = Metadata {
            name: hints.name.clone(),
            symbol: hints.symbol.clone(),
            decimals: hints.decimals,
        };
        if let Some(chain) = chain_query {
            metadata = query_new_token_metadata(chain, address, token_kind, metadata, &hints).await?;
        }

        let is_spam = hints.protocol.as_deref() == Some(SPAM_PROTOCOL)
            || (hints.protocol.is_none()
                && is_spam_token(metadata.symbol.as_deref(), metadata.name.as_deref()));
        let protocol = if is_spam {
            Some(SPAM_PROTOCOL.to_string())
        } else {
            hints.protocol.clone()
        };

        let token = EvmToken::builder(chain_id, address.clone(), token_kind)
            .name(metadata.name)
            .symbol(metadata.symbol)
            .decimals(metadata.decimals)
            .protocol(protocol)
            .underlying_tokens(hints.underlying_tokens.unwrap_or_default())
            .build();

        let mut tx = self.pool.begin().await?;
        if exists {
            edit_evm_token(&mut tx, &token).await?;
        } else {
            add_evm_token(&mut tx, &token).await?;
            add_user_asset(&mut tx, &token.identifier).await?;
            if is_spam {
                add_ignored_asset(&mut tx, &token.identifier).await?;
            }
        }
        tx.commit()
            .await
            .map_err(|e| AssetError::Input(format!("Failed to store token {}: {}", identifier, e)))?;

        if exists {
            info!("Filled in token details of existing asset {}", identifier);
        } else {
            info!("Added new token {}", identifier);
            let encounter = encounter.unwrap_or(TokenEncounterInfo {
                tx_ref: None,
                description: None,
                should_notify: true,
            });
            if encounter.should_notify {
                self.notifier.notify(WsMessage::NewTokenDetected {
                    token_identifier: identifier.clone(),
                    seen_description: encounter.description.filter(|_| encounter.tx_ref.is_none()),
                    seen_tx_ref: encounter.tx_ref,
                    is_ignored: is_spam.then_some(true),
                });
            }
        }

        let token = Arc::new(token);
        self.tokens.insert(token.clone()).await;
        Ok(token)
    }

    /// Fill in what the stored record lacks. Symbol, protocol and underlying
    /// tokens supplied by the caller never override a stored record.
    async fn backfill_existing(
        &self,
        existing: Arc<EvmToken>,
        hints: &TokenHints,
        chain_query: Option<&dyn ChainQuery>,
    ) -> Result<Arc<EvmToken>, AssetError> {
        let mut name = None;
        let mut symbol = None;
        let mut decimals = None;

        if existing.is_incomplete() {
            if let Some(hint) = &hints.name {
                name = Some(hint.clone());
            } else if let Some(chain) = chain_query {
                match query_metadata(chain, &existing.address, existing.token_kind).await {
                    Ok(metadata) => {
                        name = metadata.name;
                        decimals = metadata.decimals;
                        if existing.symbol.is_none() {
                            symbol = metadata.symbol;
                        }
                    }
                    Err(e) => warn!(
                        "Could not query metadata of incomplete token {}: {}",
                        existing.identifier, e
                    ),
                }
            }
        }
        if hints.decimals.is_some() {
            decimals = hints.decimals;
        }

        let name = name.filter(|n| *n != existing.name);
        let decimals = decimals.filter(|d| *d != existing.decimals);
        if name.is_none() && symbol.is_none() && decimals.is_none() {
            return Ok(existing);
        }

        let mut builder = existing.to_builder();
        if name.is_some() {
            builder = builder.name(name);
        }
        if symbol.is_some() {
            builder = builder.symbol(symbol);
        }
        if decimals.is_some() {
            builder = builder.decimals(decimals);
        }
        let updated = builder.build();

        let mut tx = self.pool.begin().await?;
        edit_evm_token(&mut tx, &updated).await?;
        tx.commit()
            .await
            .map_err(|e| AssetError::Input(format!("Failed to edit token {}: {}", updated.identifier, e)))?;

        debug!("Backfilled token {}", updated.identifier);
        let updated = Arc::new(updated);
        self.tokens.invalidate(&updated.identifier).await;
        self.tokens.insert(updated.clone()).await;
        Ok(updated)
    }
}

async fn query_metadata(
    chain: &dyn ChainQuery,
    address: &EvmAddress,
    token_kind: EvmTokenKind,
) -> Result<Metadata, AssetError> {
    let metadata = match token_kind {
        EvmTokenKind::Erc20 => {
            let info = chain.erc20_info(address).await?;
            Metadata {
                name: info.name,
                symbol: info.symbol,
                decimals: info.decimals,
            }
        }
        EvmTokenKind::Erc721 => {
            let info = chain.erc721_info(address).await?;
            Metadata {
                name: info.name,
                symbol: info.symbol,
                decimals: Some(0),
            }
        }
    };
    Ok(metadata)
}

async fn query_new_token_metadata(
    chain: &dyn ChainQuery,
    address: &EvmAddress,
    token_kind: EvmTokenKind,
    given: Metadata,
    hints: &TokenHints,
) -> Result<Metadata, AssetError> {
    match token_kind {
        EvmTokenKind::Erc20 => {
            if given.is_complete() {
                return Ok(given);
            }
            let queried = query_metadata(chain, address, token_kind).await?;
            let merged = Metadata {
                name: given.name.or(queried.name),
                symbol: given.symbol.or(queried.symbol),
                decimals: given.decimals.or(queried.decimals),
            };
            if merged.is_complete() {
                return Ok(merged);
            }
            match hints.fallbacks() {
                Some((name, symbol, decimals)) => {
                    debug!("Using fallback metadata for non conformant token {}", address);
                    Ok(Metadata {
                        name: Some(name),
                        symbol: Some(symbol),
                        decimals: Some(decimals),
                    })
                }
                None => Err(AssetError::NotErc20Conformant(address.to_string())),
            }
        }
        EvmTokenKind::Erc721 => {
            if given.name.is_some() && given.symbol.is_some() {
                return Ok(Metadata {
                    decimals: given.decimals.or(Some(0)),
                    ..given
                });
            }
            let queried = query_metadata(chain, address, token_kind).await?;
            Ok(Metadata {
                name: Some(given.name.or(queried.name).unwrap_or_default()),
                symbol: Some(given.symbol.or(queried.symbol).unwrap_or_default()),
                // NFTs are indivisible
                decimals: Some(0),
            })
        }
    }
}
