use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::{ProtocolIntegration, ProtocolItem, SyncCacheTypes, SyncError, SyncOutcome, TokenRef};
use crate::assets::{AssetError, TokenHints, TokenResolver};
use crate::cache::store::{
    delete_general_values, delete_general_values_like, delete_unique_values_like, get_general_values,
    get_general_values_like, get_unique_value, set_general_values, set_unique_value,
};
use crate::cache::{compute_cache_key, CacheStore, KeySegment};
use crate::db::addressbook::{add_or_update_addressbook_entries, get_addressbook_name};
use crate::models::{
    ts_now, AddressbookEntry, ChainId, EvmAddress, EvmToken, EvmTokenKind, TokenEncounterInfo,
    UnderlyingToken,
};
use crate::notifier::{Notifier, WsMessage};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Rebuild the items of a protocol from the cache tables.
pub async fn read_cached_items(
    store: &CacheStore,
    types: &SyncCacheTypes,
    chain_id: ChainId,
) -> Result<Vec<ProtocolItem>, SyncError> {
    let mut conn = store.pool().acquire().await?;

    let addresses =
        get_general_values(&mut conn, &compute_cache_key(&[types.items.into(), chain_id.into()])).await?;

    // [item_tokens, chain] prefix; the rest of each key is [item, index]
    let tokens_prefix = compute_cache_key(&[types.item_tokens.into(), chain_id.into()]);
    let mut tokens_by_item: BTreeMap<String, BTreeMap<usize, String>> = BTreeMap::new();
    for (key, value) in get_general_values_like(&mut conn, &tokens_prefix).await? {
        let parsed = key.suffix_after(&tokens_prefix).and_then(|suffix| match suffix.as_slice() {
            [item, index] => index.parse::<usize>().ok().map(|index| (item.clone(), index)),
            _ => None,
        });
        match parsed {
            Some((item, index)) => {
                tokens_by_item.entry(item).or_default().insert(index, value);
            }
            None => warn!("Ignoring cache key with unexpected layout: {}", key),
        }
    }

    let mut items = Vec::with_capacity(addresses.len());
    for raw in addresses {
        let address: EvmAddress = match raw.parse() {
            Ok(address) => address,
            Err(e) => {
                warn!("Ignoring malformed cached address {}: {}", raw, e);
                continue;
            }
        };
        let tokens = tokens_by_item
            .remove(&address.to_string())
            .unwrap_or_default()
            .into_values()
            .filter_map(|token| token.parse().ok().map(TokenRef::plain))
            .collect();
        let lp_token = get_unique_value(
            &mut conn,
            &compute_cache_key(&[types.lp_tokens.into(), chain_id.into(), (&address).into()]),
        )
        .await?
        .and_then(|raw| raw.parse().ok());
        let gauge = get_unique_value(
            &mut conn,
            &compute_cache_key(&[types.gauges.into(), chain_id.into(), (&address).into()]),
        )
        .await?
        .and_then(|raw| raw.parse().ok());

        items.push(ProtocolItem {
            address,
            label: None,
            tokens,
            lp_token,
            gauge,
        });
    }
    drop(conn);

    for item in &mut items {
        item.label = get_addressbook_name(store.pool(), &item.address, chain_id).await?;
    }

    Ok(items)
}

struct ProgressReporter<'a> {
    notifier: &'a Notifier,
    protocol: String,
    chain: ChainId,
    last_notified: Option<Instant>,
}

impl ProgressReporter<'_> {
    fn report(&mut self, processed: usize, total: usize) {
        let due = self
            .last_notified
            .map_or(true, |last| last.elapsed() >= PROGRESS_INTERVAL);
        if !due {
            return;
        }
        self.notifier.notify(WsMessage::ProtocolCacheUpdates {
            protocol: self.protocol.clone(),
            chain: self.chain,
            processed,
            total,
        });
        self.last_notified = Some(Instant::now());
    }
}

/// Drives the cache refresh of any protocol integration.
///
/// No lock guards the freshness check: two concurrent
/// refreshes of the same protocol both end in the same replace-all write.
pub struct ProtocolSyncer {
    store: CacheStore,
    resolver: Arc<TokenResolver>,
    refresh_interval: Duration,
}

impl ProtocolSyncer {
    pub fn new(store: CacheStore, resolver: Arc<TokenResolver>, refresh_interval: Duration) -> Self {
        Self {
            store,
            resolver,
            refresh_interval,
        }
    }

    pub async fn ensure_cache_data_is_updated(
        &self,
        integration: &dyn ProtocolIntegration,
        force_refresh: bool,
    ) -> Result<SyncOutcome, SyncError> {
        let chain_id = integration.chain_id();
        let types = integration.cache_types();
        let cached = read_cached_items(&self.store, &types, chain_id).await?;

        if !self
            .store
            .should_refresh(types.items, &[chain_id.into()], self.refresh_interval, force_refresh)
            .await?
        {
            debug!(
                "{} cache for chain {} is fresh ({} items)",
                integration.display_name(),
                chain_id,
                cached.len()
            );
            return Ok(SyncOutcome::Fresh { cached });
        }

        if !force_refresh {
            match integration.remote_count().await {
                Ok(Some(count)) if count == cached.len() => {
                    debug!(
                        "{} remote count {} matches the cache on chain {}",
                        integration.display_name(),
                        count,
                        chain_id
                    );
                    self.bump_timestamps(&types, chain_id).await?;
                    return Ok(SyncOutcome::Unchanged { cached });
                }
                Ok(_) => {}
                Err(e) => warn!("Could not query {} item count: {}", integration.display_name(), e),
            }
        }

        let queried = match integration.query_primary().await {
            Ok(items) => items,
            Err(primary_err) => {
                warn!(
                    "Could not query {} primary source: {}. Falling back to on-chain data",
                    integration.display_name(),
                    primary_err
                );
                integration.query_fallback(&cached).await.map_err(|fallback_err| {
                    error!(
                        "{} fallback source failed as well: {}. Keeping cached data",
                        integration.display_name(),
                        fallback_err
                    );
                    fallback_err
                })?
            }
        };

        let known: HashSet<EvmAddress> = cached.iter().map(|item| item.address.clone()).collect();
        let mut seen = HashSet::new();
        let queried: Vec<ProtocolItem> = queried
            .into_iter()
            .filter(|item| seen.insert(item.address.clone()))
            .collect();
        let total_new = queried.iter().filter(|item| !known.contains(&item.address)).count();

        let mut progress = ProgressReporter {
            notifier: self.resolver.notifier(),
            protocol: integration.protocol().to_string(),
            chain: chain_id,
            last_notified: None,
        };
        let mut validated = Vec::with_capacity(queried.len());
        let mut labels = Vec::new();
        let (mut new, mut skipped) = (0, 0);

        for item in queried {
            if known.contains(&item.address) {
                validated.push(item);
                continue;
            }

            progress.report(new + skipped + 1, total_new);
            match self.validate_item(integration, item).await {
                Ok(item) => {
                    new += 1;
                    labels.extend(addressbook_entries(integration, chain_id, &item));
                    validated.push(item);
                }
                Err(e) if e.is_conformance_error() => {
                    skipped += 1;
                    error!("Skipping {} item: {}", integration.display_name(), e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.replace_cached_items(&types, chain_id, &validated).await?;
        add_or_update_addressbook_entries(self.store.pool(), &labels).await?;
        self.bump_timestamps(&types, chain_id).await?;

        info!(
            "{} cache on chain {} refreshed: {} items, {} new, {} skipped",
            integration.display_name(),
            chain_id,
            validated.len(),
            new,
            skipped
        );
        Ok(SyncOutcome::Refreshed {
            total: validated.len(),
            new,
            skipped,
        })
    }

    async fn resolve(
        &self,
        integration: &dyn ProtocolIntegration,
        address: &EvmAddress,
        hints: TokenHints,
    ) -> Result<Arc<EvmToken>, AssetError> {
        let encounter = TokenEncounterInfo::silent(format!(
            "Querying {} pools for chain {}",
            integration.display_name(),
            integration.chain_id()
        ));
        self.resolver
            .resolve_or_create(
                integration.chain_id(),
                address,
                EvmTokenKind::Erc20,
                hints,
                integration.chain_query(),
                Some(encounter),
            )
            .await
    }

    /// Make sure every token the item references exists. Any conformance
    /// failure rejects the item, except for its gauge.
    async fn validate_item(
        &self,
        integration: &dyn ProtocolIntegration,
        mut item: ProtocolItem,
    ) -> Result<ProtocolItem, AssetError> {
        let mut symbols = Vec::with_capacity(item.tokens.len());

        for token in &item.tokens {
            if token.is_native() {
                symbols.push("ETH".to_string());
                continue;
            }

            let mut hints = TokenHints::default();
            if let Some(underlying) = token.underlying.as_ref().filter(|u| **u != token.address) {
                if underlying.address() != super::NATIVE_TOKEN_ADDRESS {
                    self.resolve(integration, underlying, TokenHints::default()).await?;
                }
                hints.underlying_tokens = Some(vec![UnderlyingToken {
                    address: underlying.clone(),
                    token_kind: EvmTokenKind::Erc20,
                    weight: 1.0,
                }]);
            }

            let resolved = self.resolve(integration, &token.address, hints).await?;
            symbols.push(resolved.symbol.clone().unwrap_or_default());
        }

        if item.label.is_none() && !symbols.is_empty() {
            item.label = Some(symbols.join("/"));
        }

        if let Some(lp_address) = &item.lp_token {
            let lp_token = self.resolve(integration, lp_address, integration.lp_token_hints()).await?;

            if let Some(gauge) = &item.gauge {
                let mut hints = integration.gauge_hints(&lp_token);
                hints.underlying_tokens = Some(vec![UnderlyingToken {
                    address: lp_address.clone(),
                    token_kind: EvmTokenKind::Erc20,
                    weight: 1.0,
                }]);
                match self.resolve(integration, gauge, hints).await {
                    Ok(_) => {}
                    Err(e) if e.is_conformance_error() => {
                        warn!("{} gauge {} is not a valid token: {}", integration.display_name(), gauge, e)
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(item)
    }

    /// Swap the whole key space of the protocol on this chain in one
    /// transaction. Readers see either the old or the new set.
    async fn replace_cached_items(
        &self,
        types: &SyncCacheTypes,
        chain_id: ChainId,
        items: &[ProtocolItem],
    ) -> Result<(), SyncError> {
        let now = ts_now();
        let items_key = compute_cache_key(&[types.items.into(), chain_id.into()]);

        let mut tx = self.store.begin().await?;
        delete_general_values(&mut tx, &items_key, None).await?;
        delete_general_values_like(&mut tx, &compute_cache_key(&[types.item_tokens.into(), chain_id.into()])).await?;
        delete_unique_values_like(&mut tx, &compute_cache_key(&[types.lp_tokens.into(), chain_id.into()])).await?;
        delete_unique_values_like(&mut tx, &compute_cache_key(&[types.gauges.into(), chain_id.into()])).await?;

        for item in items {
            set_general_values(&mut tx, &items_key, &[item.address.to_string()], now).await?;
            for (index, token) in item.tokens.iter().enumerate() {
                let key = compute_cache_key(&[
                    types.item_tokens.into(),
                    chain_id.into(),
                    (&item.address).into(),
                    index.into(),
                ]);
                set_general_values(&mut tx, &key, &[token.address.to_string()], now).await?;
            }
            if let Some(lp_token) = &item.lp_token {
                let key = compute_cache_key(&[types.lp_tokens.into(), chain_id.into(), (&item.address).into()]);
                set_unique_value(&mut tx, &key, &lp_token.to_string(), now).await?;
            }
            if let Some(gauge) = &item.gauge {
                let key = compute_cache_key(&[types.gauges.into(), chain_id.into(), (&item.address).into()]);
                set_unique_value(&mut tx, &key, &gauge.to_string(), now).await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn bump_timestamps(&self, types: &SyncCacheTypes, chain_id: ChainId) -> Result<(), SyncError> {
        let now = ts_now();
        let mut tx = self.store.begin().await?;
        for cache_type in types.all() {
            crate::cache::store::bump_last_queried_ts(&mut tx, cache_type, &[KeySegment::from(chain_id)], now)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

fn addressbook_entries(
    integration: &dyn ProtocolIntegration,
    chain_id: ChainId,
    item: &ProtocolItem,
) -> Vec<AddressbookEntry> {
    let Some(label) = &item.label else {
        return Vec::new();
    };

    let mut entries = vec![AddressbookEntry {
        address: item.address.clone(),
        blockchain: chain_id,
        name: label.clone(),
    }];
    if let Some(gauge) = &item.gauge {
        entries.push(AddressbookEntry {
            address: gauge.clone(),
            blockchain: chain_id,
            name: format!("{} gauge for {}", integration.display_name(), label),
        });
    }
    entries
}
