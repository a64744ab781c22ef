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

//! Integration tests for the ranking cache under concurrent readers.
//!
//! Several cache instances share one lock store and one ranking store, the
//! way several application processes share Redis.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use storefront_locks::{DistributedLockManager, MemoryLockStore};
use storefront_ranking::{
    InMemoryOrderSource, MemoryRankingStore, OrderAggregationSource, ProductOrderCount, RankingCache,
    RankingCacheConfig, RankingError, RankingRefreshDriver, RankingResult, RankingStore, RankingWindow,
};

/// Aggregation source that counts calls and takes `delay` per call.
struct SlowSource {
    orders: InMemoryOrderSource,
    delay: Duration,
    calls: AtomicUsize,
}

impl SlowSource {
    fn new(orders: InMemoryOrderSource, delay: Duration) -> Self {
        Self {
            orders,
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderAggregationSource for SlowSource {
    async fn aggregate_order_counts(&self, since: DateTime<Utc>) -> RankingResult<Vec<ProductOrderCount>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.orders.aggregate_order_counts(since).await
    }
}

/// Source that fails on the first `failures` calls.
struct FlakySource {
    orders: InMemoryOrderSource,
    failures: AtomicUsize,
}

#[async_trait]
impl OrderAggregationSource for FlakySource {
    async fn aggregate_order_counts(&self, since: DateTime<Utc>) -> RankingResult<Vec<ProductOrderCount>> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(RankingError::Source("replica lagging".to_string()));
        }
        self.orders.aggregate_order_counts(since).await
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn sample_orders() -> InMemoryOrderSource {
    let orders = InMemoryOrderSource::new();
    let now = Utc::now();
    orders.record_orders(1, 8, now - chrono::Duration::hours(2)).await;
    orders.record_orders(2, 2, now - chrono::Duration::days(1)).await;
    orders.record_orders(3, 1, now).await;
    orders.record_orders(4, 3, now - chrono::Duration::hours(30)).await;
    orders
}

struct Cluster {
    caches: Vec<Arc<RankingCache>>,
    store: MemoryRankingStore,
}

/// `instances` caches over one shared lock store and one shared ranking store.
fn cluster(instances: usize, source: Arc<dyn OrderAggregationSource>, config: RankingCacheConfig) -> Cluster {
    let lock_store = Arc::new(MemoryLockStore::new());
    let store = MemoryRankingStore::new();
    let caches = (0..instances)
        .map(|_| {
            Arc::new(RankingCache::new(
                Arc::new(store.clone()),
                source.clone(),
                DistributedLockManager::with_defaults(lock_store.clone()),
                config,
            ))
        })
        .collect();
    Cluster { caches, store }
}

#[tokio::test]
async fn test_ranking_matches_order_counts() {
    let source = Arc::new(SlowSource::new(sample_orders().await, Duration::ZERO));
    let cluster = cluster(1, source, RankingCacheConfig::default());

    let ranking = cluster.caches[0].get(3, 5).await.unwrap();
    let rows: Vec<(u64, u64, u32)> = ranking
        .items
        .iter()
        .map(|r| (r.product_id, r.order_count, r.rank))
        .collect();
    assert_eq!(rows, vec![(1, 8, 1), (4, 3, 2), (2, 2, 3), (3, 1, 4)]);
    assert_eq!(ranking.window, RankingWindow::new(3, 5).unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_cold_stampede_computes_once() {
    init_tracing();
    let source = Arc::new(SlowSource::new(sample_orders().await, Duration::from_millis(200)));
    let cluster = cluster(4, source.clone(), RankingCacheConfig::default());

    let readers = (0..100).map(|i| {
        let cache = cluster.caches[i % cluster.caches.len()].clone();
        tokio::spawn(async move { cache.get(3, 5).await })
    });
    let results = tokio::time::timeout(Duration::from_secs(10), join_all(readers))
        .await
        .expect("stampede readers deadlocked");

    for result in results {
        let ranking = result.unwrap().unwrap();
        assert_eq!(ranking.items.len(), 4);
        assert_eq!(ranking.items[0].product_id, 1);
    }
    assert_eq!(source.calls(), 1);

    let redundant: u64 = cluster.caches.iter().map(|c| c.stats().redundant_recomputes).sum();
    assert_eq!(redundant, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_recompute_falls_back_without_deadlock() {
    init_tracing();
    let source = Arc::new(SlowSource::new(sample_orders().await, Duration::from_millis(400)));
    let config = RankingCacheConfig {
        lock_wait: Duration::from_millis(10),
        contention_wait: Duration::from_millis(50),
        contention_poll: Duration::from_millis(10),
        ..RankingCacheConfig::default()
    };
    let cluster = cluster(2, source.clone(), config);

    let readers = (0..10).map(|i| {
        let cache = cluster.caches[i % 2].clone();
        tokio::spawn(async move { cache.get(3, 5).await })
    });
    let results = tokio::time::timeout(Duration::from_secs(10), join_all(readers))
        .await
        .expect("contended readers deadlocked");

    for result in results {
        let ranking = result.unwrap().unwrap();
        assert!(!ranking.items.is_empty());
    }

    let redundant: u64 = cluster.caches.iter().map(|c| c.stats().redundant_recomputes).sum();
    let recomputes: u64 = cluster.caches.iter().map(|c| c.stats().recomputes).sum();
    assert_eq!(recomputes, 1);
    assert!(redundant >= 1);
    assert!(source.calls() <= 10);
    assert_eq!(source.calls() as u64, recomputes + redundant);
    assert_eq!(cluster.store.len().await, 1);
}

#[tokio::test]
async fn test_invalidation_triggers_recompute_with_new_data() {
    let orders = sample_orders().await;
    let source = Arc::new(SlowSource::new(orders.clone(), Duration::ZERO));
    let cluster = cluster(2, source.clone(), RankingCacheConfig::default());

    let before = cluster.caches[0].get(3, 5).await.unwrap();
    assert_eq!(before.items[0].product_id, 1);

    orders.record_orders(5, 12, Utc::now()).await;
    assert_eq!(cluster.caches[1].get(3, 5).await.unwrap(), before);

    cluster.caches[1].invalidate(3, 5).await.unwrap();
    let after = cluster.caches[0].get(3, 5).await.unwrap();
    assert_eq!(after.items[0].product_id, 5);
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn test_entries_expire_after_ttl() {
    let source = Arc::new(SlowSource::new(sample_orders().await, Duration::ZERO));
    let config = RankingCacheConfig {
        ttl: Duration::from_millis(50),
        ..RankingCacheConfig::default()
    };
    let cluster = cluster(1, source.clone(), config);

    cluster.caches[0].get(3, 5).await.unwrap();
    cluster.caches[0].get(3, 5).await.unwrap();
    assert_eq!(source.calls(), 1);

    tokio::time::sleep(Duration::from_millis(80)).await;
    cluster.caches[0].get(3, 5).await.unwrap();
    assert_eq!(source.calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_refresh_driver_survives_failures() {
    init_tracing();
    let source = Arc::new(FlakySource {
        orders: sample_orders().await,
        failures: AtomicUsize::new(2),
    });
    let config = RankingCacheConfig {
        ttl: Duration::from_secs(5),
        ..RankingCacheConfig::default()
    };
    let cluster = cluster(1, source, config);
    let cache = cluster.caches[0].clone();

    let windows = vec![RankingWindow::new(3, 5).unwrap()];
    let driver = Arc::new(RankingRefreshDriver::new(cache.clone(), windows, Duration::from_millis(25)).unwrap());
    let handle = driver.start();

    let store = cluster.store.clone();
    let populated = tokio::time::timeout(Duration::from_secs(2), async move {
        loop {
            if store.get("order-item-rank:days_3_limit_5").await.unwrap().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(populated.is_ok(), "driver never refreshed after failures");

    driver.stop();
    tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();

    let hits_before = cache.stats().hits;
    assert_eq!(cache.get(3, 5).await.unwrap().items.len(), 4);
    assert_eq!(cache.stats().hits, hits_before + 1);
}

#[cfg(feature = "redis-backend")]
mod redis_backend {
    use super::*;
    use storefront_ranking::RedisRankingStore;

    fn redis_url() -> Option<String> {
        std::env::var("STOREFRONT_TEST_REDIS_URL").ok()
    }

    #[tokio::test]
    async fn test_redis_store_round_trip_and_clear() {
        let Some(url) = redis_url() else {
            eprintln!("STOREFRONT_TEST_REDIS_URL not set, skipping");
            return;
        };
        let namespace = format!("test-{}", std::process::id());
        let store = RedisRankingStore::new(&url, &namespace).await.unwrap();

        let now = Utc::now();
        let snapshot = storefront_ranking::RankingSnapshot {
            window: RankingWindow::new(3, 5).unwrap(),
            items: storefront_ranking::compute_ranking(vec![ProductOrderCount::new(1, 8)], 5),
            created_at: now,
            updated_at: now,
        };
        store.put("a", &snapshot, Duration::from_secs(30)).await.unwrap();
        store.put("b", &snapshot, Duration::from_secs(30)).await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), Some(snapshot));
        assert_eq!(store.clear().await.unwrap(), 2);
        assert!(store.get("b").await.unwrap().is_none());
    }
}
