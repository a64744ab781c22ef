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

//! Order aggregation source: the durable order data the ranking is computed from.

use crate::{ProductId, ProductOrderCount, RankingResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Read-only aggregation over recent orders.
///
/// Called only by ranking recomputation. Returned pairs are ordered; that
/// order is the tie-break for products with equal counts.
#[async_trait]
pub trait OrderAggregationSource: Send + Sync {
    /// Order counts per product for orders placed at or after `since`.
    async fn aggregate_order_counts(&self, since: DateTime<Utc>) -> RankingResult<Vec<ProductOrderCount>>;
}

#[derive(Debug, Clone, Copy)]
struct OrderRecord {
    product_id: ProductId,
    ordered_at: DateTime<Utc>,
}

/// In-memory order log (for testing and demos).
///
/// Products appear in the aggregation in order of their first recorded order.
#[derive(Clone, Default)]
pub struct InMemoryOrderSource {
    orders: Arc<RwLock<Vec<OrderRecord>>>,
}

impl InMemoryOrderSource {
    /// Create an empty order log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one order item for `product_id`.
    pub async fn record_order(&self, product_id: ProductId, ordered_at: DateTime<Utc>) {
        self.orders.write().await.push(OrderRecord {
            product_id,
            ordered_at,
        });
    }

    /// Record `count` order items for `product_id` at `ordered_at`.
    pub async fn record_orders(&self, product_id: ProductId, count: usize, ordered_at: DateTime<Utc>) {
        let mut orders = self.orders.write().await;
        orders.extend(std::iter::repeat(OrderRecord {
            product_id,
            ordered_at,
        })
        .take(count));
    }

    /// Number of recorded order items.
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Whether no orders were recorded.
    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait]
impl OrderAggregationSource for InMemoryOrderSource {
    async fn aggregate_order_counts(&self, since: DateTime<Utc>) -> RankingResult<Vec<ProductOrderCount>> {
        let orders = self.orders.read().await;
        let mut positions: HashMap<ProductId, usize> = HashMap::new();
        let mut counts: Vec<ProductOrderCount> = Vec::new();

        for order in orders.iter().filter(|o| o.ordered_at >= since) {
            let idx = *positions.entry(order.product_id).or_insert_with(|| {
                counts.push(ProductOrderCount::new(order.product_id, 0));
                counts.len() - 1
            });
            counts[idx].order_count += 1;
        }
        Ok(counts)
    }
}
