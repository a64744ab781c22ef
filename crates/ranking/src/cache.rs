// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Storefront Contributors
//
// This file is part of Storefront.
//
// Storefront is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// Storefront is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with Storefront. If not, see <https://www.gnu.org/licenses/>.

//! Ranking cache: cache-aside reads with refresh-ahead and stampede protection.
//!
//! ## Read path
//! 1. Lock-free lookup; a live entry is returned immediately.
//! 2. On a miss, try the recompute lock for the window
//!    (`order-item-rank:window:days_{d}_limit_{l}`) for `lock_wait`.
//!    - Acquired: re-check the store, otherwise aggregate, rank, store with
//!      the TTL, unlock. The lock is a guard, so a cancelled read releases it
//!      too.
//!    - Not acquired (or the lock store is unreachable): poll the store for
//!      up to `contention_wait`, then compute a redundant ranking that is
//!      returned to the caller but never written.
//!
//! Only lock holders (and explicit invalidation) mutate the store, so at most
//! one recompute per window writes at a time. A redundant pass costs one extra
//! aggregation for a reader that waited `lock_wait + contention_wait` without
//! seeing the entry.

use crate::{
    compute_ranking, OrderAggregationSource, RankingError, RankingResult, RankingSnapshot, RankingStore,
    RankingWindow,
};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use storefront_locks::{domain, DistributedLockManager};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Resource type of the recompute lock.
pub const RANKING_LOCK_TYPE: &str = "window";

/// Tuning for [`RankingCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankingCacheConfig {
    /// Entry lifetime
    pub ttl: Duration,
    /// How long a missing reader tries for the recompute lock
    pub lock_wait: Duration,
    /// How long a reader that lost the lock waits for the entry to appear
    pub contention_wait: Duration,
    /// Store polling interval while waiting for another recompute
    pub contention_poll: Duration,
    /// Lock wait for [`RankingCache::refresh`]
    pub refresh_lock_timeout: Duration,
}

impl Default for RankingCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            lock_wait: Duration::from_millis(50),
            contention_wait: Duration::from_secs(2),
            contention_poll: Duration::from_millis(20),
            refresh_lock_timeout: Duration::from_secs(5),
        }
    }
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RankingCacheStats {
    /// Reads served from the store
    pub hits: u64,
    /// Reads that found no entry on the lock-free lookup
    pub misses: u64,
    /// Rankings computed and stored under the lock (reads and refreshes)
    pub recomputes: u64,
    /// Rankings computed without the lock and not stored
    pub redundant_recomputes: u64,
}

#[derive(Default)]
struct StatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    recomputes: AtomicU64,
    redundant_recomputes: AtomicU64,
}

impl StatsCounters {
    fn record(&self, counter: &AtomicU64, outcome: &'static str) {
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("storefront_ranking_cache_total", "outcome" => outcome).increment(1);
    }

    fn snapshot(&self) -> RankingCacheStats {
        RankingCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            recomputes: self.recomputes.load(Ordering::Relaxed),
            redundant_recomputes: self.redundant_recomputes.load(Ordering::Relaxed),
        }
    }
}

/// Top-N products by order count over a trailing window of days.
pub struct RankingCache {
    store: Arc<dyn RankingStore>,
    source: Arc<dyn OrderAggregationSource>,
    locks: DistributedLockManager,
    config: RankingCacheConfig,
    stats: StatsCounters,
}

impl RankingCache {
    /// Create a cache over `store`, computing from `source`, coordinating
    /// recomputes through `locks`.
    pub fn new(
        store: Arc<dyn RankingStore>,
        source: Arc<dyn OrderAggregationSource>,
        locks: DistributedLockManager,
        config: RankingCacheConfig,
    ) -> Self {
        Self {
            store,
            source,
            locks,
            config,
            stats: StatsCounters::default(),
        }
    }

    /// Cache tuning.
    pub fn config(&self) -> &RankingCacheConfig {
        &self.config
    }

    /// Current counters.
    pub fn stats(&self) -> RankingCacheStats {
        self.stats.snapshot()
    }

    /// Ranking for the trailing `days`, at most `limit` products.
    pub async fn get(&self, days: u32, limit: usize) -> RankingResult<RankingSnapshot> {
        let window = RankingWindow::new(days, limit)?;
        let cache_key = window.cache_key();

        if let Some(snapshot) = self.lookup(&cache_key).await {
            self.stats.record(&self.stats.hits, "hit");
            return Ok(snapshot);
        }
        self.stats.record(&self.stats.misses, "miss");

        let guard = match self
            .locks
            .try_domain_lock_guard(domain::ORDER_ITEM_RANK, RANKING_LOCK_TYPE, &window.lock_id(), self.config.lock_wait)
            .await
        {
            Ok(guard) => guard,
            Err(e) => {
                warn!(window = %window, error = %e, "Ranking lock unavailable, serving without the lock");
                None
            }
        };

        match guard {
            Some(guard) => {
                let result = self.recompute_if_missing(window, &cache_key).await;
                guard.unlock().await;
                result
            }
            None => self.wait_for_recompute(window, &cache_key).await,
        }
    }

    /// Recompute and store the ranking regardless of the current entry.
    ///
    /// Takes the recompute lock (waiting up to `refresh_lock_timeout`), keeps
    /// the `created_at` of the entry it replaces.
    pub async fn refresh(&self, days: u32, limit: usize) -> RankingResult<RankingSnapshot> {
        let window = RankingWindow::new(days, limit)?;
        let cache_key = window.cache_key();

        self.locks
            .execute_with_domain_lock(
                domain::ORDER_ITEM_RANK,
                RANKING_LOCK_TYPE,
                &window.lock_id(),
                self.config.refresh_lock_timeout,
                || async {
                    let previous = self.lookup(&cache_key).await;
                    let snapshot = self.compute(window, previous.map(|s| s.created_at)).await?;
                    self.store.put(&cache_key, &snapshot, self.config.ttl).await?;
                    self.stats.record(&self.stats.recomputes, "refresh");
                    debug!(window = %window, items = snapshot.items.len(), "Ranking refreshed");
                    Ok::<_, RankingError>(snapshot)
                },
            )
            .await
    }

    /// Drop the entry for `(days, limit)`; the next read recomputes.
    pub async fn invalidate(&self, days: u32, limit: usize) -> RankingResult<()> {
        let window = RankingWindow::new(days, limit)?;
        self.store.delete(&window.cache_key()).await?;
        debug!(window = %window, "Ranking invalidated");
        Ok(())
    }

    /// Drop every ranking entry. Returns how many were removed.
    pub async fn invalidate_all(&self) -> RankingResult<usize> {
        let removed = self.store.clear().await?;
        debug!(removed, "All rankings invalidated");
        Ok(removed)
    }

    async fn lookup(&self, cache_key: &str) -> Option<RankingSnapshot> {
        match self.store.get(cache_key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = cache_key, error = %e, "Ranking store read failed, treating as miss");
                None
            }
        }
    }

    async fn recompute_if_missing(&self, window: RankingWindow, cache_key: &str) -> RankingResult<RankingSnapshot> {
        if let Some(snapshot) = self.lookup(cache_key).await {
            self.stats.record(&self.stats.hits, "hit_after_lock");
            return Ok(snapshot);
        }

        let snapshot = self.compute(window, None).await?;
        if let Err(e) = self.store.put(cache_key, &snapshot, self.config.ttl).await {
            warn!(window = %window, error = %e, "Failed to store ranking");
        }
        self.stats.record(&self.stats.recomputes, "recompute");
        debug!(window = %window, items = snapshot.items.len(), "Ranking recomputed");
        Ok(snapshot)
    }

    async fn wait_for_recompute(&self, window: RankingWindow, cache_key: &str) -> RankingResult<RankingSnapshot> {
        let deadline = Instant::now() + self.config.contention_wait;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(self.config.contention_poll.min(deadline - now)).await;
            if let Some(snapshot) = self.lookup(cache_key).await {
                self.stats.record(&self.stats.hits, "hit_after_wait");
                return Ok(snapshot);
            }
        }

        warn!(
            window = %window,
            waited_ms = self.config.contention_wait.as_millis() as u64,
            "Ranking still missing after contention wait, computing without storing"
        );
        let snapshot = self.compute(window, None).await?;
        self.stats.record(&self.stats.redundant_recomputes, "redundant");
        Ok(snapshot)
    }

    async fn compute(&self, window: RankingWindow, created_at: Option<DateTime<Utc>>) -> RankingResult<RankingSnapshot> {
        let now = Utc::now();
        let since = window.since(now)?;
        let counts = self.source.aggregate_order_counts(since).await?;
        Ok(RankingSnapshot {
            window,
            items: compute_ranking(counts, window.limit),
            created_at: created_at.unwrap_or(now),
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryOrderSource, MemoryRankingStore, ProductOrderCount};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use storefront_locks::{LockError, LockKey, LockResult, LockStore, MemoryLockStore};

    struct CountingSource {
        inner: InMemoryOrderSource,
        calls: AtomicUsize,
        failing: AtomicBool,
    }

    impl CountingSource {
        fn new(inner: InMemoryOrderSource) -> Self {
            Self {
                inner,
                calls: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OrderAggregationSource for CountingSource {
        async fn aggregate_order_counts(&self, since: DateTime<Utc>) -> RankingResult<Vec<ProductOrderCount>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(RankingError::Source("orders database down".to_string()));
            }
            self.inner.aggregate_order_counts(since).await
        }
    }

    struct SlowSource {
        inner: InMemoryOrderSource,
        delay: Duration,
    }

    #[async_trait]
    impl OrderAggregationSource for SlowSource {
        async fn aggregate_order_counts(&self, since: DateTime<Utc>) -> RankingResult<Vec<ProductOrderCount>> {
            tokio::time::sleep(self.delay).await;
            self.inner.aggregate_order_counts(since).await
        }
    }

    struct UnreachableLockStore;

    #[async_trait]
    impl LockStore for UnreachableLockStore {
        async fn set_if_absent(&self, _: &LockKey, _: &str, _: Duration) -> LockResult<bool> {
            Err(LockError::StoreUnavailable("connection refused".to_string()))
        }
        async fn compare_and_delete(&self, _: &LockKey, _: &str) -> LockResult<bool> {
            Err(LockError::StoreUnavailable("connection refused".to_string()))
        }
        async fn exists(&self, _: &LockKey) -> LockResult<bool> {
            Err(LockError::StoreUnavailable("connection refused".to_string()))
        }
    }

    struct Fixture {
        cache: RankingCache,
        store: MemoryRankingStore,
        source: Arc<CountingSource>,
        orders: InMemoryOrderSource,
        locks: DistributedLockManager,
    }

    fn quick_config() -> RankingCacheConfig {
        RankingCacheConfig {
            contention_wait: Duration::from_millis(100),
            contention_poll: Duration::from_millis(10),
            refresh_lock_timeout: Duration::from_millis(200),
            ..RankingCacheConfig::default()
        }
    }

    async fn fixture_with(lock_store: Arc<dyn LockStore>) -> Fixture {
        let orders = InMemoryOrderSource::new();
        let now = Utc::now();
        orders.record_orders(1, 8, now).await;
        orders.record_orders(2, 2, now).await;
        orders.record_orders(3, 1, now).await;
        orders.record_orders(4, 3, now).await;

        let store = MemoryRankingStore::new();
        let source = Arc::new(CountingSource::new(orders.clone()));
        let locks = DistributedLockManager::with_defaults(lock_store);
        let cache = RankingCache::new(Arc::new(store.clone()), source.clone(), locks.clone(), quick_config());
        Fixture {
            cache,
            store,
            source,
            orders,
            locks,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(Arc::new(MemoryLockStore::new())).await
    }

    fn ids(snapshot: &RankingSnapshot) -> Vec<u64> {
        snapshot.items.iter().map(|r| r.product_id).collect()
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let f = fixture().await;

        let first = f.cache.get(3, 5).await.unwrap();
        assert_eq!(ids(&first), vec![1, 4, 2, 3]);
        assert_eq!(first.items.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(f.source.calls(), 1);

        let second = f.cache.get(3, 5).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(f.source.calls(), 1);

        let stats = f.cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.recomputes, 1);
        assert_eq!(stats.redundant_recomputes, 0);
    }

    #[tokio::test]
    async fn test_windows_are_cached_separately() {
        let f = fixture().await;
        let top2 = f.cache.get(3, 2).await.unwrap();
        let top5 = f.cache.get(3, 5).await.unwrap();
        assert_eq!(ids(&top2), vec![1, 4]);
        assert_eq!(top5.items.len(), 4);
        assert_eq!(f.store.len().await, 2);
    }

    #[tokio::test]
    async fn test_old_orders_fall_outside_window() {
        let f = fixture().await;
        f.orders.record_orders(9, 50, Utc::now() - chrono::Duration::days(10)).await;

        let ranking = f.cache.get(3, 5).await.unwrap();
        assert!(!ids(&ranking).contains(&9));

        let wide = f.cache.get(30, 5).await.unwrap();
        assert_eq!(ids(&wide)[0], 9);
    }

    #[tokio::test]
    async fn test_invalid_window_rejected() {
        let f = fixture().await;
        assert!(matches!(f.cache.get(0, 5).await, Err(RankingError::InvalidWindow { .. })));
        assert!(matches!(f.cache.refresh(3, 0).await, Err(RankingError::InvalidWindow { .. })));
        assert_eq!(f.source.calls(), 0);
    }

    #[tokio::test]
    async fn test_window_beyond_calendar_is_rejected() {
        let f = fixture().await;
        assert!(matches!(
            f.cache.get(u32::MAX, 5).await,
            Err(RankingError::InvalidWindow { days: u32::MAX, limit: 5 })
        ));
        assert!(matches!(f.cache.refresh(u32::MAX, 5).await, Err(RankingError::InvalidWindow { .. })));
        assert_eq!(f.source.calls(), 0);

        let key = LockKey::generate(domain::ORDER_ITEM_RANK, RANKING_LOCK_TYPE, &format!("days_{}_limit_5", u32::MAX))
            .unwrap();
        assert!(!f.locks.is_locked(&key).await.unwrap());
        assert!(f.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_refresh_recomputes_and_keeps_created_at() {
        let f = fixture().await;
        let first = f.cache.get(3, 5).await.unwrap();

        f.orders.record_orders(3, 20, Utc::now()).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let refreshed = f.cache.refresh(3, 5).await.unwrap();

        assert_eq!(ids(&refreshed)[0], 3);
        assert_eq!(refreshed.created_at, first.created_at);
        assert!(refreshed.updated_at > first.updated_at);
        assert_eq!(f.cache.get(3, 5).await.unwrap(), refreshed);
        assert_eq!(f.source.calls(), 2);
    }

    #[tokio::test]
    async fn test_refresh_times_out_while_recompute_lock_held() {
        let f = fixture().await;
        let handle = f
            .locks
            .try_domain_lock(domain::ORDER_ITEM_RANK, RANKING_LOCK_TYPE, "days_3_limit_5", Duration::ZERO)
            .await
            .unwrap()
            .unwrap();

        let result = f.cache.refresh(3, 5).await;
        assert!(matches!(result, Err(RankingError::Lock(LockError::AcquisitionTimeout { .. }))));
        assert_eq!(f.source.calls(), 0);

        f.locks.unlock_domain(&handle).await;
    }

    #[tokio::test]
    async fn test_invalidate_forces_recompute() {
        let f = fixture().await;
        f.cache.get(3, 5).await.unwrap();
        f.cache.invalidate(3, 5).await.unwrap();
        f.cache.get(3, 5).await.unwrap();
        assert_eq!(f.source.calls(), 2);

        f.cache.get(7, 5).await.unwrap();
        assert_eq!(f.cache.invalidate_all().await.unwrap(), 2);
        assert!(f.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_contended_reader_computes_without_storing() {
        let f = fixture().await;
        let handle = f
            .locks
            .try_domain_lock(domain::ORDER_ITEM_RANK, RANKING_LOCK_TYPE, "days_3_limit_5", Duration::ZERO)
            .await
            .unwrap()
            .unwrap();

        let ranking = f.cache.get(3, 5).await.unwrap();
        assert_eq!(ids(&ranking), vec![1, 4, 2, 3]);
        assert!(f.store.is_empty().await);
        assert_eq!(f.cache.stats().redundant_recomputes, 1);

        f.locks.unlock_domain(&handle).await;
    }

    #[tokio::test]
    async fn test_contended_reader_picks_up_stored_entry() {
        let f = fixture().await;
        let handle = f
            .locks
            .try_domain_lock(domain::ORDER_ITEM_RANK, RANKING_LOCK_TYPE, "days_3_limit_5", Duration::ZERO)
            .await
            .unwrap()
            .unwrap();

        let store = f.store.clone();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let now = Utc::now();
            let snapshot = RankingSnapshot {
                window: RankingWindow::new(3, 5).unwrap(),
                items: Vec::new(),
                created_at: now,
                updated_at: now,
            };
            store.put("order-item-rank:days_3_limit_5", &snapshot, Duration::from_secs(60)).await.unwrap();
        });

        let ranking = f.cache.get(3, 5).await.unwrap();
        writer.await.unwrap();
        assert!(ranking.items.is_empty());
        assert_eq!(f.source.calls(), 0);

        f.locks.unlock_domain(&handle).await;
    }

    #[tokio::test]
    async fn test_unreachable_lock_store_never_writes_cache() {
        let f = fixture_with(Arc::new(UnreachableLockStore)).await;

        let ranking = f.cache.get(3, 5).await.unwrap();
        assert_eq!(ids(&ranking), vec![1, 4, 2, 3]);
        assert!(f.store.is_empty().await);

        let refresh = f.cache.refresh(3, 5).await;
        assert!(matches!(refresh, Err(RankingError::Lock(LockError::StoreUnavailable(_)))));
    }

    #[tokio::test]
    async fn test_source_failure_releases_recompute_lock() {
        let f = fixture().await;
        f.source.failing.store(true, Ordering::SeqCst);
        assert!(matches!(f.cache.get(3, 5).await, Err(RankingError::Source(_))));

        let key = LockKey::generate(domain::ORDER_ITEM_RANK, RANKING_LOCK_TYPE, "days_3_limit_5").unwrap();
        assert!(!f.locks.is_locked(&key).await.unwrap());

        f.source.failing.store(false, Ordering::SeqCst);
        assert_eq!(f.cache.get(3, 5).await.unwrap().items.len(), 4);
    }

    #[tokio::test]
    async fn test_cancelled_read_releases_recompute_lock() {
        let f = fixture().await;
        let source = Arc::new(SlowSource {
            inner: f.orders.clone(),
            delay: Duration::from_millis(300),
        });
        let cache = RankingCache::new(Arc::new(f.store.clone()), source, f.locks.clone(), quick_config());

        let outcome = tokio::time::timeout(Duration::from_millis(100), cache.get(3, 5)).await;
        assert!(outcome.is_err());

        tokio::time::sleep(Duration::from_millis(50)).await;
        let key = LockKey::generate(domain::ORDER_ITEM_RANK, RANKING_LOCK_TYPE, "days_3_limit_5").unwrap();
        assert!(!f.locks.is_locked(&key).await.unwrap());
        assert!(f.store.is_empty().await);

        // The next cold reader takes the lock instead of falling back
        let ranking = f.cache.get(3, 5).await.unwrap();
        assert_eq!(ids(&ranking), vec![1, 4, 2, 3]);
        assert_eq!(f.cache.stats().redundant_recomputes, 0);
        assert_eq!(f.store.len().await, 1);
    }
}
