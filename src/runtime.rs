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

//! Storefront assembly: one lock manager shared by every service and by the
//! ranking cache.

use crate::repository::{
    CouponRepository, InMemoryCouponRepository, InMemoryPointRepository, InMemoryProductRepository, PointRepository,
    ProductRepository,
};
use crate::services::{CouponIssueService, CouponStockService, PointService, ProductStockService};
use crate::{StorefrontConfig, StorefrontResult};
use std::sync::Arc;
use storefront_locks::{create_lock_manager_from_config, DistributedLockManager, LockInterceptor};
use storefront_ranking::{
    create_ranking_cache_from_config, InMemoryOrderSource, OrderAggregationSource, RankingCache,
    RankingRefreshDriver,
};
use tokio::task::JoinHandle;
use tracing::info;

/// Data sources the storefront runs against.
#[derive(Clone)]
pub struct Repositories {
    /// Coupon events and issued coupons
    pub coupons: Arc<dyn CouponRepository>,
    /// User point balances
    pub points: Arc<dyn PointRepository>,
    /// Product inventory
    pub products: Arc<dyn ProductRepository>,
    /// Order aggregation for rankings
    pub orders: Arc<dyn OrderAggregationSource>,
}

impl Repositories {
    /// Empty in-memory repositories (for testing and demos).
    pub fn in_memory() -> Self {
        Self {
            coupons: Arc::new(InMemoryCouponRepository::new()),
            points: Arc::new(InMemoryPointRepository::new()),
            products: Arc::new(InMemoryProductRepository::new()),
            orders: Arc::new(InMemoryOrderSource::new()),
        }
    }
}

/// Wired storefront services.
pub struct Storefront {
    locks: DistributedLockManager,
    coupon_stock: CouponStockService,
    coupon_issue: CouponIssueService,
    points: PointService,
    products: ProductStockService,
    ranking: Arc<RankingCache>,
    refresh: Arc<RankingRefreshDriver>,
}

impl Storefront {
    /// Build every component from `config` over `repos`.
    pub async fn from_config(config: StorefrontConfig, repos: Repositories) -> StorefrontResult<Self> {
        config.ranking.validate()?;
        let locks = create_lock_manager_from_config(config.locks).await?;
        let interceptor = LockInterceptor::new(locks.clone());

        let ranking = create_ranking_cache_from_config(&config.ranking, repos.orders, locks.clone()).await?;
        let refresh = Arc::new(RankingRefreshDriver::new(
            ranking.clone(),
            config.ranking.windows.clone(),
            config.ranking.refresh_interval,
        )?);

        info!(
            lease_ms = locks.config().lease_ttl.as_millis() as u64,
            windows = config.ranking.windows.len(),
            "Storefront assembled"
        );

        Ok(Self {
            coupon_stock: CouponStockService::new(repos.coupons.clone(), interceptor.clone()),
            coupon_issue: CouponIssueService::new(repos.coupons, interceptor.clone()),
            points: PointService::new(repos.points, interceptor),
            products: ProductStockService::new(repos.products, locks.clone()),
            locks,
            ranking,
            refresh,
        })
    }

    /// Build from `STOREFRONT_*` environment variables.
    pub async fn from_env(repos: Repositories) -> StorefrontResult<Self> {
        Self::from_config(StorefrontConfig::from_env()?, repos).await
    }

    /// Shared lock manager.
    pub fn locks(&self) -> &DistributedLockManager {
        &self.locks
    }

    /// Coupon stock service.
    pub fn coupon_stock(&self) -> &CouponStockService {
        &self.coupon_stock
    }

    /// Coupon issuance service.
    pub fn coupon_issue(&self) -> &CouponIssueService {
        &self.coupon_issue
    }

    /// Point service.
    pub fn points(&self) -> &PointService {
        &self.points
    }

    /// Product stock service.
    pub fn products(&self) -> &ProductStockService {
        &self.products
    }

    /// Ranking cache.
    pub fn ranking(&self) -> &Arc<RankingCache> {
        &self.ranking
    }

    /// Start the ranking refresh driver.
    pub fn start_refresh(&self) -> JoinHandle<()> {
        self.refresh.start()
    }

    /// Signal the ranking refresh driver to stop.
    pub fn stop_refresh(&self) {
        self.refresh.stop();
    }
}
