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

//! Storefront: lock-protected commerce services and a product ranking cache.
//!
//! Several application instances share one lock store. Every
//! read-validate-write unit of work on a shared counter (coupon stock,
//! coupon issuance, point balances, product stock) runs under a distributed
//! lock declared with a [`LockSpec`], and the "most ordered products"
//! ranking is recomputed at most once per window at a time.
//!
//! Crates:
//! 1. [`locks`]: keys, lock stores, the lock manager and the interception layer
//! 2. [`ranking`]: ranking cache, ranking stores and the refresh driver
//!
//! This crate wires both together ([`Storefront`]), reads configuration from
//! the environment ([`StorefrontConfig`]) and hosts the domain services.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub use storefront_locks as locks;
pub use storefront_ranking as ranking;

pub mod config;
pub mod error;
pub mod repository;
pub mod runtime;
pub mod services;
pub mod tracing_setup;

pub use config::StorefrontConfig;
pub use error::{StorefrontError, StorefrontResult};
pub use runtime::{Repositories, Storefront};
pub use tracing_setup::init_tracing;

// Commonly used lock and ranking types
pub use locks::{domain, DistributedLockManager, LockError, LockInterceptor, LockSpec};
pub use ranking::{RankingCache, RankingError, RankingSnapshot};
