#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::cache::freshness::is_stale;
    use crate::cache::{compute_cache_key, CacheStore, CacheType};
    use crate::models::{ts_now, ChainId};
    use crate::tests::setup_pool;

    const WEEK: Duration = Duration::from_secs(7 * 24 * 3600);

    #[test]
    fn staleness_rule() {
        assert!(is_stale(0, 1_000, WEEK));
        assert!(!is_stale(1_000, 1_000 + 60, Duration::from_secs(61)));
        assert!(is_stale(1_000, 1_000 + 61, Duration::from_secs(61)));
    }

    #[tokio::test]
    async fn empty_cache_needs_refresh() {
        let store = CacheStore::new(setup_pool().await);
        assert!(store
            .should_refresh(CacheType::CurvePoolAddress, &[ChainId::ETHEREUM.into()], WEEK, false)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn recent_data_is_fresh_unless_forced() {
        let store = CacheStore::new(setup_pool().await);
        let key = compute_cache_key(&[CacheType::CurvePoolAddress.into(), ChainId::ETHEREUM.into()]);
        store.set_general_values(&key, &["pool"], ts_now()).await.unwrap();

        assert!(!store
            .should_refresh(CacheType::CurvePoolAddress, &[ChainId::ETHEREUM.into()], WEEK, false)
            .await
            .unwrap());
        assert!(store
            .should_refresh(CacheType::CurvePoolAddress, &[ChainId::ETHEREUM.into()], WEEK, true)
            .await
            .unwrap());
        // other chains keep their own timestamp
        assert!(store
            .should_refresh(CacheType::CurvePoolAddress, &[ChainId::OPTIMISM.into()], WEEK, false)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn old_data_is_stale() {
        let store = CacheStore::new(setup_pool().await);
        let key = compute_cache_key(&[CacheType::CurvePoolAddress.into(), ChainId::ETHEREUM.into()]);
        let two_weeks_ago = ts_now() - 2 * WEEK.as_secs() as i64;
        store.set_general_values(&key, &["pool"], two_weeks_ago).await.unwrap();

        assert!(store
            .should_refresh(CacheType::CurvePoolAddress, &[ChainId::ETHEREUM.into()], WEEK, false)
            .await
            .unwrap());
    }
}
