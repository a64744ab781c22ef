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

//! Lock store trait: the only infrastructure dependency of the lock layer.

use crate::{LockKey, LockResult};
use async_trait::async_trait;
use std::time::Duration;

/// Shared key/value store offering atomic lock primitives.
///
/// ## Purpose
/// Every application instance talks to the same store, which is the single
/// source of truth for mutual exclusion. Implementations must make each
/// method atomic at the store level.
///
/// ## Design
/// - **set_if_absent**: create `key -> owner_token` with a TTL only if the key
///   is missing or expired
/// - **compare_and_delete**: delete `key` only if it still maps to
///   `owner_token`, so a holder whose lease expired cannot release a lock
///   that someone else has since acquired
/// - **exists**: non-blocking probe
///
/// Connectivity failures must surface as
/// [`LockError::StoreUnavailable`](crate::LockError::StoreUnavailable), never
/// as a successful acquisition.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Atomically set `key` to `owner_token` with `ttl` if no live entry exists.
    ///
    /// ## Returns
    /// - `Ok(true)`: the caller now owns the key
    /// - `Ok(false)`: another owner holds the key
    async fn set_if_absent(&self, key: &LockKey, owner_token: &str, ttl: Duration) -> LockResult<bool>;

    /// Atomically delete `key` if it is held by `owner_token`.
    ///
    /// ## Returns
    /// - `Ok(true)`: the entry was deleted
    /// - `Ok(false)`: missing, expired, or held by another owner (nothing changed)
    async fn compare_and_delete(&self, key: &LockKey, owner_token: &str) -> LockResult<bool>;

    /// Whether a live entry exists for `key`.
    async fn exists(&self, key: &LockKey) -> LockResult<bool>;
}
