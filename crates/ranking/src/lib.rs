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

//! # Storefront Ranking Cache
//!
//! ## Purpose
//! Serves "top `limit` products by order count over the trailing `days`
//! days" with low read latency. Recomputation is an expensive aggregation
//! over recent orders and runs at most once per window at a time, even when
//! many readers miss together.
//!
//! ## Components
//! - [`RankingCache`]: cache-aside reads, lock-protected recompute,
//!   `refresh`/`invalidate` entry points
//! - [`RankingRefreshDriver`]: refresh-ahead on a fixed interval below the TTL
//! - [`RankingStore`]: TTL storage, one entry per window
//! - [`OrderAggregationSource`]: read-only order counts per product
//!
//! ## Backend Support
//! - **InMemory**: HashMap-based (always available, for testing)
//! - **Redis**: JSON payloads with native expiry (feature: `redis-backend`)
//!
//! ## Examples
//! ```rust
//! use std::sync::Arc;
//! use chrono::Utc;
//! use storefront_locks::{DistributedLockManager, MemoryLockStore};
//! use storefront_ranking::{InMemoryOrderSource, MemoryRankingStore, RankingCache, RankingCacheConfig};
//!
//! # async fn example() -> storefront_ranking::RankingResult<()> {
//! let orders = InMemoryOrderSource::new();
//! orders.record_orders(1, 8, Utc::now()).await;
//!
//! let cache = RankingCache::new(
//!     Arc::new(MemoryRankingStore::new()),
//!     Arc::new(orders),
//!     DistributedLockManager::with_defaults(Arc::new(MemoryLockStore::new())),
//!     RankingCacheConfig::default(),
//! );
//! let top = cache.get(3, 5).await?;
//! assert_eq!(top.items[0].rank, 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod config;
pub mod error;
pub mod memory;
pub mod model;
pub mod refresh;
pub mod source;
pub mod store;

#[cfg(feature = "redis-backend")]
pub mod redis;

pub use cache::{RankingCache, RankingCacheConfig, RankingCacheStats, RANKING_LOCK_TYPE};
pub use config::{create_ranking_cache_from_config, create_ranking_store_from_config, RankingBackend, RankingConfig};
pub use error::{RankingError, RankingResult};
pub use memory::MemoryRankingStore;
pub use model::{compute_ranking, ProductId, ProductOrderCount, RankedProduct, RankingSnapshot, RankingWindow};
pub use refresh::RankingRefreshDriver;
pub use source::{InMemoryOrderSource, OrderAggregationSource};
pub use store::RankingStore;

#[cfg(feature = "redis-backend")]
pub use redis::RedisRankingStore;
