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

//! Configuration support for lock store backends.
//!
//! ## Environment Variables
//!
//! ### Backend Selection
//! - `STOREFRONT_LOCK_BACKEND`: Backend type (default: "in-memory")
//!   - "in-memory" | "memory" → MemoryLockStore
//!   - "redis" → RedisLockStore (feature: `redis-backend`)
//!
//! ### Redis Configuration
//! - `STOREFRONT_LOCK_REDIS_URL`: Redis server URL (default: "redis://localhost:6379")
//! - `STOREFRONT_LOCK_REDIS_NAMESPACE`: Key prefix for isolation (default: "storefront")
//!
//! ### Manager Tuning
//! - `STOREFRONT_LOCK_LEASE_MS`: Lease TTL per lock (default: 30000)
//! - `STOREFRONT_LOCK_RETRY_MS`: Polling interval under contention (default: 50)
//! - `STOREFRONT_LOCK_WAIT_MS`: Default wait timeout for lock specs (default: 3000)
//!
//! ## Examples
//! ```bash
//! export STOREFRONT_LOCK_BACKEND=redis
//! export STOREFRONT_LOCK_REDIS_URL=redis://localhost:6379
//! export STOREFRONT_LOCK_LEASE_MS=10000
//! ```

use crate::{DistributedLockManager, LockError, LockManagerConfig, LockResult, LockStore, MemoryLockStore};
use std::sync::Arc;
use std::time::Duration;

/// Lock store backend.
#[derive(Debug, Clone, Default)]
pub enum LockBackend {
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

/// Lock layer configuration.
#[derive(Debug, Clone, Default)]
pub struct LockConfig {
    /// Store backend
    pub backend: LockBackend,
    /// Manager tuning
    pub manager: LockManagerConfig,
}

impl LockConfig {
    /// Create configuration with explicit values.
    pub fn new(backend: LockBackend, manager: LockManagerConfig) -> Self {
        Self { backend, manager }
    }

    /// Create configuration from environment variables.
    ///
    /// See module documentation for the complete list.
    pub fn from_env() -> LockResult<Self> {
        let backend_str = std::env::var("STOREFRONT_LOCK_BACKEND")
            .unwrap_or_else(|_| "in-memory".to_string())
            .to_lowercase();

        let backend = match backend_str.as_str() {
            "in-memory" | "memory" => LockBackend::InMemory,
            "redis" => LockBackend::Redis {
                url: std::env::var("STOREFRONT_LOCK_REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
                namespace: std::env::var("STOREFRONT_LOCK_REDIS_NAMESPACE")
                    .unwrap_or_else(|_| "storefront".to_string()),
            },
            other => {
                return Err(LockError::Config(format!(
                    "Unknown lock backend: {}. Valid options: in-memory, redis",
                    other
                )))
            }
        };

        let defaults = LockManagerConfig::default();
        let manager = LockManagerConfig {
            lease_ttl: env_millis("STOREFRONT_LOCK_LEASE_MS")?.unwrap_or(defaults.lease_ttl),
            retry_interval: env_millis("STOREFRONT_LOCK_RETRY_MS")?.unwrap_or(defaults.retry_interval),
            default_wait_timeout: env_millis("STOREFRONT_LOCK_WAIT_MS")?
                .unwrap_or(defaults.default_wait_timeout),
        };
        if manager.lease_ttl.is_zero() {
            return Err(LockError::Config("STOREFRONT_LOCK_LEASE_MS must be positive".to_string()));
        }
        if manager.retry_interval.is_zero() {
            return Err(LockError::Config("STOREFRONT_LOCK_RETRY_MS must be positive".to_string()));
        }

        Ok(Self { backend, manager })
    }
}

fn env_millis(name: &str) -> LockResult<Option<Duration>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|e| LockError::Config(format!("{} must be milliseconds: {}", name, e))),
        Err(_) => Ok(None),
    }
}

/// Create a lock store from explicit configuration.
pub async fn create_lock_store_from_config(backend: &LockBackend) -> LockResult<Arc<dyn LockStore>> {
    match backend {
        LockBackend::InMemory => Ok(Arc::new(MemoryLockStore::new())),

        #[cfg(feature = "redis-backend")]
        LockBackend::Redis { url, namespace } => {
            let store = crate::redis::RedisLockStore::new(url, namespace).await?;
            Ok(Arc::new(store))
        }

        #[cfg(not(feature = "redis-backend"))]
        LockBackend::Redis { .. } => Err(LockError::Config(
            "Redis backend requires 'redis-backend' feature".to_string(),
        )),
    }
}

/// Create a lock manager from explicit configuration.
pub async fn create_lock_manager_from_config(config: LockConfig) -> LockResult<DistributedLockManager> {
    let store = create_lock_store_from_config(&config.backend).await?;
    Ok(DistributedLockManager::new(store, config.manager))
}

/// Create a lock manager from environment configuration.
pub async fn create_lock_manager_from_env() -> LockResult<DistributedLockManager> {
    create_lock_manager_from_config(LockConfig::from_env()?).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for name in [
            "STOREFRONT_LOCK_BACKEND",
            "STOREFRONT_LOCK_REDIS_URL",
            "STOREFRONT_LOCK_REDIS_NAMESPACE",
            "STOREFRONT_LOCK_LEASE_MS",
            "STOREFRONT_LOCK_RETRY_MS",
            "STOREFRONT_LOCK_WAIT_MS",
        ] {
            std::env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn test_config_from_env_default() {
        clear_env();
        let config = LockConfig::from_env().unwrap();
        assert!(matches!(config.backend, LockBackend::InMemory));
        assert_eq!(config.manager.lease_ttl, Duration::from_secs(30));
        assert_eq!(config.manager.retry_interval, Duration::from_millis(50));
    }

    #[test]
    #[serial]
    fn test_config_from_env_redis() {
        clear_env();
        std::env::set_var("STOREFRONT_LOCK_BACKEND", "redis");
        std::env::set_var("STOREFRONT_LOCK_REDIS_URL", "redis://cache:6379");
        std::env::set_var("STOREFRONT_LOCK_LEASE_MS", "5000");

        let config = LockConfig::from_env().unwrap();
        match config.backend {
            LockBackend::Redis { url, namespace } => {
                assert_eq!(url, "redis://cache:6379");
                assert_eq!(namespace, "storefront");
            }
            _ => panic!("Expected Redis backend"),
        }
        assert_eq!(config.manager.lease_ttl, Duration::from_millis(5000));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_from_env_invalid_values() {
        clear_env();
        std::env::set_var("STOREFRONT_LOCK_BACKEND", "zookeeper");
        assert!(matches!(LockConfig::from_env(), Err(LockError::Config(_))));

        clear_env();
        std::env::set_var("STOREFRONT_LOCK_RETRY_MS", "soon");
        assert!(matches!(LockConfig::from_env(), Err(LockError::Config(_))));

        clear_env();
        std::env::set_var("STOREFRONT_LOCK_LEASE_MS", "0");
        assert!(matches!(LockConfig::from_env(), Err(LockError::Config(_))));
        clear_env();
    }

    #[tokio::test]
    async fn test_create_in_memory_manager() {
        let manager = create_lock_manager_from_config(LockConfig::default()).await.unwrap();
        let handle = manager
            .try_domain_lock("coupon-event", "id", "1", Duration::ZERO)
            .await
            .unwrap();
        assert!(handle.is_some());
    }

    #[cfg(not(feature = "redis-backend"))]
    #[tokio::test]
    async fn test_redis_requires_feature() {
        let backend = LockBackend::Redis {
            url: "redis://localhost:6379".to_string(),
            namespace: "test".to_string(),
        };
        assert!(matches!(
            create_lock_store_from_config(&backend).await,
            Err(LockError::Config(_))
        ));
    }
}
