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

//! Batch product stock adjustment.
//!
//! A batch locks every product it touches (`product-stock:id:{product_id}`)
//! in global key order, so overlapping batches submitted in any order cannot
//! deadlock. The batch is validated in full before anything is written.

use crate::repository::{ProductId, ProductRepository, RepositoryError};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use storefront_locks::{domain, DistributedLockManager, LockError};
use thiserror::Error;
use tracing::debug;

/// Product stock failure.
#[derive(Error, Debug)]
pub enum ProductError {
    /// Unknown product
    #[error("Product {0} not found")]
    ProductNotFound(ProductId),

    /// The adjustment would leave negative stock
    #[error("Product {product_id} has {stock} in stock, cannot apply {delta}")]
    InsufficientStock {
        /// Product
        product_id: ProductId,
        /// Stock before the adjustment
        stock: i64,
        /// Net requested adjustment
        delta: i64,
    },

    /// Repository failure
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Lock contention or lock store failure
    #[error("Lock error: {0}")]
    Lock(#[from] LockError),
}

impl ProductError {
    /// Whether the failure came from the lock layer and a retry may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProductError::Lock(e) if e.is_retryable())
    }
}

/// Adjusts stock for many products at once.
pub struct ProductStockService {
    products: Arc<dyn ProductRepository>,
    locks: DistributedLockManager,
}

impl ProductStockService {
    /// Create the service.
    pub fn new(products: Arc<dyn ProductRepository>, locks: DistributedLockManager) -> Self {
        Self { products, locks }
    }

    /// Apply every `(product_id, delta)` or none of them.
    ///
    /// Deltas for the same product are summed. Returns the new stock per
    /// product, ordered by product id.
    pub async fn adjust_batch(&self, adjustments: &[(ProductId, i64)]) -> Result<Vec<(ProductId, i64)>, ProductError> {
        let mut net: BTreeMap<ProductId, i64> = BTreeMap::new();
        for (product_id, delta) in adjustments {
            *net.entry(*product_id).or_default() += delta;
        }
        if net.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = net.keys().map(ToString::to_string).collect();
        let timeout: Duration = self.locks.config().default_wait_timeout;

        self.locks
            .with_same_domain_locks(domain::PRODUCT_STOCK, "id", &ids, timeout, || async {
                let mut updated = Vec::with_capacity(net.len());
                for (&product_id, &delta) in &net {
                    let stock = self
                        .products
                        .stock(product_id)
                        .await?
                        .ok_or(ProductError::ProductNotFound(product_id))?;
                    let next = stock
                        .checked_add(delta)
                        .filter(|s| *s >= 0)
                        .ok_or(ProductError::InsufficientStock {
                            product_id,
                            stock,
                            delta,
                        })?;
                    updated.push((product_id, next));
                }
                for &(product_id, stock) in &updated {
                    self.products.set_stock(product_id, stock).await?;
                }
                debug!(products = updated.len(), "Product stock batch applied");
                Ok(updated)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryProductRepository;
    use storefront_locks::MemoryLockStore;

    async fn service() -> (ProductStockService, InMemoryProductRepository) {
        let repo = InMemoryProductRepository::new();
        repo.set_stock(1, 10).await.unwrap();
        repo.set_stock(2, 5).await.unwrap();
        let locks = DistributedLockManager::with_defaults(Arc::new(MemoryLockStore::new()));
        (ProductStockService::new(Arc::new(repo.clone()), locks), repo)
    }

    #[tokio::test]
    async fn test_batch_applies_net_deltas() {
        let (service, _) = service().await;
        let updated = service.adjust_batch(&[(2, -2), (1, -3), (2, -1)]).await.unwrap();
        assert_eq!(updated, vec![(1, 7), (2, 2)]);
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let (service, repo) = service().await;
        let err = service.adjust_batch(&[(1, -3), (2, -6)]).await.unwrap_err();
        assert!(matches!(err, ProductError::InsufficientStock { product_id: 2, .. }));
        assert_eq!(repo.stock(1).await.unwrap(), Some(10));

        assert!(matches!(
            service.adjust_batch(&[(3, 1)]).await,
            Err(ProductError::ProductNotFound(3))
        ));
        assert!(service.adjust_batch(&[]).await.unwrap().is_empty());
    }
}
