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

//! Ranking data model and the ranking computation.

use crate::{RankingError, RankingResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use storefront_locks::domain;

/// Product identifier.
pub type ProductId = u64;

/// Aggregated order count for one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductOrderCount {
    /// Product
    pub product_id: ProductId,
    /// Orders in the window
    pub order_count: u64,
}

impl ProductOrderCount {
    /// Convenience constructor.
    pub fn new(product_id: ProductId, order_count: u64) -> Self {
        Self {
            product_id,
            order_count,
        }
    }
}

/// One ranked product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedProduct {
    /// Product
    pub product_id: ProductId,
    /// Orders in the window
    pub order_count: u64,
    /// Dense 1-based rank
    pub rank: u32,
}

/// Ranking parameters: trailing `days` window, top `limit` products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RankingWindow {
    /// Trailing window in days
    pub days: u32,
    /// Maximum number of ranked products
    pub limit: usize,
}

impl RankingWindow {
    /// Validated window.
    pub fn new(days: u32, limit: usize) -> RankingResult<Self> {
        if days == 0 || limit == 0 {
            return Err(RankingError::InvalidWindow { days, limit });
        }
        Ok(Self { days, limit })
    }

    /// Start of the window ending at `now`.
    ///
    /// Fails with [`RankingError::InvalidWindow`] when `days` reaches before
    /// the earliest representable date.
    pub fn since(&self, now: DateTime<Utc>) -> RankingResult<DateTime<Utc>> {
        chrono::Duration::try_days(i64::from(self.days))
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or(RankingError::InvalidWindow {
                days: self.days,
                limit: self.limit,
            })
    }

    /// Resource id used for the recompute lock, e.g. `days_3_limit_5`.
    pub fn lock_id(&self) -> String {
        format!("days_{}_limit_{}", self.days, self.limit)
    }

    /// Key of the cache entry for this window.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", domain::ORDER_ITEM_RANK, self.lock_id())
    }
}

impl fmt::Display for RankingWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.days, self.limit)
    }
}

impl FromStr for RankingWindow {
    type Err = RankingError;

    /// Parse `days:limit`, e.g. `3:5`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (days, limit) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| RankingError::Config(format!("expected days:limit, got `{}`", s)))?;
        let days = days
            .trim()
            .parse()
            .map_err(|e| RankingError::Config(format!("invalid days in `{}`: {}", s, e)))?;
        let limit = limit
            .trim()
            .parse()
            .map_err(|e| RankingError::Config(format!("invalid limit in `{}`: {}", s, e)))?;
        Self::new(days, limit)
    }
}

/// Cached ranking for one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingSnapshot {
    /// Window this ranking covers
    pub window: RankingWindow,
    /// Ranked products, best first
    pub items: Vec<RankedProduct>,
    /// First computation of this entry
    pub created_at: DateTime<Utc>,
    /// Latest recomputation
    pub updated_at: DateTime<Utc>,
}

/// Rank products by order count.
///
/// Sorts descending by count (stable, so ties keep input order), assigns
/// dense ranks `1..=n` and keeps at most `limit` entries.
pub fn compute_ranking(mut counts: Vec<ProductOrderCount>, limit: usize) -> Vec<RankedProduct> {
    counts.sort_by(|a, b| b.order_count.cmp(&a.order_count));
    counts
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(idx, count)| RankedProduct {
            product_id: count.product_id,
            order_count: count.order_count,
            rank: idx as u32 + 1,
        })
        .collect()
}
