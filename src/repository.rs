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

//! Repositories behind the lock-protected services.
//!
//! Each repository is a plain read/write surface with no locking of its own:
//! mutual exclusion comes from the lock wrapped around the whole
//! read-validate-write unit of work.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Coupon event identifier.
pub type CouponEventId = u64;
/// User identifier.
pub type UserId = u64;
/// Product identifier.
pub type ProductId = u64;

/// Repository failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Repository error: {0}")]
pub struct RepositoryError(pub String);

/// Result type for repository calls.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Coupon events and issued coupons.
#[async_trait]
pub trait CouponRepository: Send + Sync {
    /// Remaining stock of a coupon event, `None` if the event does not exist.
    async fn stock(&self, event_id: CouponEventId) -> RepositoryResult<Option<u32>>;

    /// Overwrite the remaining stock of a coupon event.
    async fn set_stock(&self, event_id: CouponEventId, stock: u32) -> RepositoryResult<()>;

    /// Whether `user_id` already holds a coupon from `event_id`.
    async fn is_issued(&self, event_id: CouponEventId, user_id: UserId) -> RepositoryResult<bool>;

    /// Record a coupon of `event_id` issued to `user_id`.
    async fn record_issue(&self, event_id: CouponEventId, user_id: UserId) -> RepositoryResult<()>;
}

/// User point balances.
#[async_trait]
pub trait PointRepository: Send + Sync {
    /// Current balance (zero for unknown users).
    async fn balance(&self, user_id: UserId) -> RepositoryResult<i64>;

    /// Overwrite the balance.
    async fn set_balance(&self, user_id: UserId, balance: i64) -> RepositoryResult<()>;
}

/// Product inventory.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Stock on hand, `None` if the product does not exist.
    async fn stock(&self, product_id: ProductId) -> RepositoryResult<Option<i64>>;

    /// Overwrite stock on hand.
    async fn set_stock(&self, product_id: ProductId, stock: i64) -> RepositoryResult<()>;
}

/// In-memory coupon repository (for testing and demos).
#[derive(Clone, Default)]
pub struct InMemoryCouponRepository {
    stock: Arc<RwLock<HashMap<CouponEventId, u32>>>,
    issued: Arc<RwLock<HashSet<(CouponEventId, UserId)>>>,
}

impl InMemoryCouponRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of coupons issued for `event_id`.
    pub async fn issued_count(&self, event_id: CouponEventId) -> usize {
        self.issued.read().await.iter().filter(|(e, _)| *e == event_id).count()
    }
}

#[async_trait]
impl CouponRepository for InMemoryCouponRepository {
    async fn stock(&self, event_id: CouponEventId) -> RepositoryResult<Option<u32>> {
        Ok(self.stock.read().await.get(&event_id).copied())
    }

    async fn set_stock(&self, event_id: CouponEventId, stock: u32) -> RepositoryResult<()> {
        self.stock.write().await.insert(event_id, stock);
        Ok(())
    }

    async fn is_issued(&self, event_id: CouponEventId, user_id: UserId) -> RepositoryResult<bool> {
        Ok(self.issued.read().await.contains(&(event_id, user_id)))
    }

    async fn record_issue(&self, event_id: CouponEventId, user_id: UserId) -> RepositoryResult<()> {
        self.issued.write().await.insert((event_id, user_id));
        Ok(())
    }
}

/// In-memory point repository (for testing and demos).
#[derive(Clone, Default)]
pub struct InMemoryPointRepository {
    balances: Arc<RwLock<HashMap<UserId, i64>>>,
}

impl InMemoryPointRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PointRepository for InMemoryPointRepository {
    async fn balance(&self, user_id: UserId) -> RepositoryResult<i64> {
        Ok(self.balances.read().await.get(&user_id).copied().unwrap_or(0))
    }

    async fn set_balance(&self, user_id: UserId, balance: i64) -> RepositoryResult<()> {
        self.balances.write().await.insert(user_id, balance);
        Ok(())
    }
}

/// In-memory product repository (for testing and demos).
#[derive(Clone, Default)]
pub struct InMemoryProductRepository {
    stock: Arc<RwLock<HashMap<ProductId, i64>>>,
}

impl InMemoryProductRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn stock(&self, product_id: ProductId) -> RepositoryResult<Option<i64>> {
        Ok(self.stock.read().await.get(&product_id).copied())
    }

    async fn set_stock(&self, product_id: ProductId, stock: i64) -> RepositoryResult<()> {
        self.stock.write().await.insert(product_id, stock);
        Ok(())
    }
}
