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

//! Configuration support for the ranking cache.
//!
//! ## Environment Variables
//!
//! ### Backend Selection
//! - `STOREFRONT_RANKING_BACKEND`: Backend type (default: "in-memory")
//!   - "in-memory" | "memory" → MemoryRankingStore
//!   - "redis" → RedisRankingStore (feature: `redis-backend`)
//!
//! ### Redis Configuration
//! - `STOREFRONT_RANKING_REDIS_URL`: Redis server URL (default: "redis://localhost:6379")
//! - `STOREFRONT_RANKING_REDIS_NAMESPACE`: Key prefix (default: "storefront")
//!
//! ### Cache and Refresh
//! - `STOREFRONT_RANKING_TTL_SECS`: Entry lifetime (default: 600)
//! - `STOREFRONT_RANKING_REFRESH_SECS`: Refresh driver interval, must be below the TTL (default: 300)
//! - `STOREFRONT_RANKING_WINDOWS`: Comma-separated `days:limit` pairs to refresh (default: "3:5")

use crate::{
    MemoryRankingStore, OrderAggregationSource, RankingCache, RankingCacheConfig, RankingError, RankingResult,
    RankingStore, RankingWindow,
};
use std::sync::Arc;
use std::time::Duration;
use storefront_locks::DistributedLockManager;

/// Ranking store backend.
#[derive(Debug, Clone, Default)]
pub enum RankingBackend {
    /// In-memory HashMap backend (default, single process)
    #[default]
    InMemory,
    /// Redis backend (requires redis-backend feature)
    Redis {
        /// Redis server URL
        url: String,
        /// Key namespace prefix
        namespace: String,
    },
}

/// Ranking cache and refresh driver configuration.
#[derive(Debug, Clone)]
pub struct RankingConfig {
    /// Store backend
    pub backend: RankingBackend,
    /// Cache tuning
    pub cache: RankingCacheConfig,
    /// Refresh driver interval
    pub refresh_interval: Duration,
    /// Windows kept warm by the refresh driver
    pub windows: Vec<RankingWindow>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            backend: RankingBackend::InMemory,
            cache: RankingCacheConfig::default(),
            refresh_interval: Duration::from_secs(300),
            windows: vec![RankingWindow { days: 3, limit: 5 }],
        }
    }
}

impl RankingConfig {
    /// Create configuration from environment variables.
    ///
    /// See module documentation for the complete list.
    pub fn from_env() -> RankingResult<Self> {
        let backend_str = std::env::var("STOREFRONT_RANKING_BACKEND")
            .unwrap_or_else(|_| "in-memory".to_string())
            .to_lowercase();

        let backend = match backend_str.as_str() {
            "in-memory" | "memory" => RankingBackend::InMemory,
            "redis" => RankingBackend::Redis {
                url: std::env::var("STOREFRONT_RANKING_REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
                namespace: std::env::var("STOREFRONT_RANKING_REDIS_NAMESPACE")
                    .unwrap_or_else(|_| "storefront".to_string()),
            },
            other => {
                return Err(RankingError::Config(format!(
                    "Unknown ranking backend: {}. Valid options: in-memory, redis",
                    other
                )))
            }
        };

        let defaults = Self::default();
        let cache = RankingCacheConfig {
            ttl: env_secs("STOREFRONT_RANKING_TTL_SECS")?.unwrap_or(defaults.cache.ttl),
            ..defaults.cache
        };
        let refresh_interval = env_secs("STOREFRONT_RANKING_REFRESH_SECS")?.unwrap_or(defaults.refresh_interval);
        let windows = match std::env::var("STOREFRONT_RANKING_WINDOWS") {
            Ok(raw) => parse_windows(&raw)?,
            Err(_) => defaults.windows,
        };

        let config = Self {
            backend,
            cache,
            refresh_interval,
            windows,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the TTL and refresh interval relationship.
    pub fn validate(&self) -> RankingResult<()> {
        if self.cache.ttl.is_zero() {
            return Err(RankingError::Config("STOREFRONT_RANKING_TTL_SECS must be positive".to_string()));
        }
        if self.refresh_interval.is_zero() || self.refresh_interval >= self.cache.ttl {
            return Err(RankingError::Config(format!(
                "refresh interval {:?} must be positive and shorter than ttl {:?}",
                self.refresh_interval, self.cache.ttl
            )));
        }
        Ok(())
    }
}

fn env_secs(name: &str) -> RankingResult<Option<Duration>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|e| RankingError::Config(format!("{} must be seconds: {}", name, e))),
        Err(_) => Ok(None),
    }
}

fn parse_windows(raw: &str) -> RankingResult<Vec<RankingWindow>> {
    let mut windows = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let window: RankingWindow = part.parse()?;
        if !windows.contains(&window) {
            windows.push(window);
        }
    }
    Ok(windows)
}

/// Create a ranking store from explicit configuration.
pub async fn create_ranking_store_from_config(backend: &RankingBackend) -> RankingResult<Arc<dyn RankingStore>> {
    match backend {
        RankingBackend::InMemory => Ok(Arc::new(MemoryRankingStore::new())),

        #[cfg(feature = "redis-backend")]
        RankingBackend::Redis { url, namespace } => {
            let store = crate::redis::RedisRankingStore::new(url, namespace).await?;
            Ok(Arc::new(store))
        }

        #[cfg(not(feature = "redis-backend"))]
        RankingBackend::Redis { .. } => Err(RankingError::Config(
            "Redis backend requires 'redis-backend' feature".to_string(),
        )),
    }
}

/// Create a ranking cache from configuration, an aggregation source and the
/// shared lock manager.
pub async fn create_ranking_cache_from_config(
    config: &RankingConfig,
    source: Arc<dyn OrderAggregationSource>,
    locks: DistributedLockManager,
) -> RankingResult<Arc<RankingCache>> {
    let store = create_ranking_store_from_config(&config.backend).await?;
    Ok(Arc::new(RankingCache::new(store, source, locks, config.cache)))
}
