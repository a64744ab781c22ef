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

//! # Storefront Distributed Locks
//!
//! ## Purpose
//! Protects shared mutable counters (coupon stock, coupon issuance, user
//! point balances, product stock) from concurrent corruption across several
//! application instances. All instances share one lock store; the store is
//! the single source of truth for mutual exclusion.
//!
//! ## Architecture Context
//! This crate is used by:
//! - **Domain services**: wrap each read-validate-write unit of work with a
//!   [`LockSpec`] through the [`LockInterceptor`]
//! - **Ranking cache**: try/unlock on the ranking key to allow at most one
//!   recomputation per key at a time
//!
//! ## Design Decisions
//! - **Owner tokens**: every acquisition writes a fresh ULID; release is a
//!   compare-and-delete on that token, so an expired holder cannot release a
//!   newer holder's lock
//! - **Bounded waits**: every acquisition has a timeout, there is no
//!   unbounded mode
//! - **Global ordering**: composite locks are acquired in lexicographic key
//!   order, which rules out circular waits
//! - **Fail closed**: an unreachable store is an error, never an acquired lock
//!
//! ## Backend Support
//! - **InMemory**: HashMap-based (always available, for testing)
//! - **Redis**: `SET NX PX` + Lua compare-and-delete (feature: `redis-backend`)
//!
//! ## Examples
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use storefront_locks::{domain, DistributedLockManager, LockError, MemoryLockStore};
//!
//! # async fn example() -> Result<(), LockError> {
//! let manager = DistributedLockManager::with_defaults(Arc::new(MemoryLockStore::new()));
//!
//! let remaining = manager
//!     .execute_with_domain_lock(domain::COUPON_EVENT, "id", "42", Duration::from_secs(1), || async {
//!         // read stock, validate, write stock - 1
//!         Ok::<_, LockError>(9)
//!     })
//!     .await?;
//! assert_eq!(remaining, 9);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod interceptor;
pub mod key;
pub mod manager;
pub mod memory;
pub mod store;

#[cfg(feature = "redis-backend")]
pub mod redis;

pub use config::{
    create_lock_manager_from_config, create_lock_manager_from_env, create_lock_store_from_config, LockBackend,
    LockConfig,
};
pub use error::{LockError, LockResult};
pub use interceptor::{LockArgs, LockInterceptor, LockSpec, Locked, ResourceIdExpr};
pub use key::{domain, DomainResource, LockKey};
pub use manager::{DistributedLockManager, DomainLockGuard, LockHandle, LockManagerConfig};
pub use memory::MemoryLockStore;
pub use store::LockStore;

#[cfg(feature = "redis-backend")]
pub use redis::RedisLockStore;
