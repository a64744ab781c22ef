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

//! Combined environment configuration.
//!
//! Reads the lock layer (`STOREFRONT_LOCK_*`) and ranking cache
//! (`STOREFRONT_RANKING_*`) variables; see [`LockConfig`] and
//! [`RankingConfig`] for the full lists.

use crate::StorefrontResult;
use storefront_locks::LockConfig;
use storefront_ranking::RankingConfig;

/// Storefront runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct StorefrontConfig {
    /// Lock store backend and manager tuning
    pub locks: LockConfig,
    /// Ranking store backend, cache tuning and refresh schedule
    pub ranking: RankingConfig,
}

impl StorefrontConfig {
    /// Create configuration with explicit values.
    pub fn new(locks: LockConfig, ranking: RankingConfig) -> Self {
        Self { locks, ranking }
    }

    /// Create configuration from environment variables.
    pub fn from_env() -> StorefrontResult<Self> {
        Ok(Self {
            locks: LockConfig::from_env()?,
            ranking: RankingConfig::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::time::Duration;
    use storefront_locks::LockBackend;

    #[test]
    #[serial]
    fn test_from_env_combines_layers() {
        std::env::set_var("STOREFRONT_LOCK_WAIT_MS", "750");
        std::env::set_var("STOREFRONT_RANKING_WINDOWS", "1:3,7:10");

        let config = StorefrontConfig::from_env().unwrap();
        assert!(matches!(config.locks.backend, LockBackend::InMemory));
        assert_eq!(config.locks.manager.default_wait_timeout, Duration::from_millis(750));
        assert_eq!(config.ranking.windows.len(), 2);

        std::env::remove_var("STOREFRONT_LOCK_WAIT_MS");
        std::env::remove_var("STOREFRONT_RANKING_WINDOWS");
    }

    #[test]
    #[serial]
    fn test_from_env_reports_bad_layer() {
        std::env::set_var("STOREFRONT_RANKING_BACKEND", "etcd");
        assert!(StorefrontConfig::from_env().is_err());
        std::env::remove_var("STOREFRONT_RANKING_BACKEND");
    }
}
