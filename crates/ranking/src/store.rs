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

//! Ranking cache storage trait.

use crate::{RankingResult, RankingSnapshot};
use async_trait::async_trait;
use std::time::Duration;

/// Storage for ranking snapshots, one entry per window, each with a TTL.
///
/// The store is eventually consistent and is mutated only by holders of the
/// ranking recompute lock (or by explicit invalidation). Readers that do not
/// hold the lock only read.
#[async_trait]
pub trait RankingStore: Send + Sync {
    /// Live snapshot for `key`, if any.
    async fn get(&self, key: &str) -> RankingResult<Option<RankingSnapshot>>;

    /// Store `snapshot` under `key`, expiring after `ttl`.
    async fn put(&self, key: &str, snapshot: &RankingSnapshot, ttl: Duration) -> RankingResult<()>;

    /// Delete `key` (idempotent).
    async fn delete(&self, key: &str) -> RankingResult<()>;

    /// Delete every ranking entry, returning how many were removed.
    async fn clear(&self) -> RankingResult<usize>;
}
