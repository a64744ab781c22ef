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

//! User point balances, one lock per user.

use crate::repository::{PointRepository, RepositoryError, UserId};
use std::sync::Arc;
use storefront_locks::{domain, LockArgs, LockError, LockInterceptor, LockSpec, ResourceIdExpr};
use thiserror::Error;
use tracing::debug;

/// Point operation failure.
#[derive(Error, Debug)]
pub enum PointError {
    /// The adjustment would leave a negative balance
    #[error("User {user_id} has {balance} points, cannot apply {delta}")]
    InsufficientPoints {
        /// User
        user_id: UserId,
        /// Balance before the adjustment
        balance: i64,
        /// Requested adjustment
        delta: i64,
    },

    /// Repository failure
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Lock contention or lock store failure
    #[error("Lock error: {0}")]
    Lock(#[from] LockError),
}

impl PointError {
    /// Whether the failure came from the lock layer and a retry may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PointError::Lock(e) if e.is_retryable())
    }
}

/// Earns and spends user points under `user-point:id:{user_id}`.
pub struct PointService {
    points: Arc<dyn PointRepository>,
    interceptor: LockInterceptor,
    balance_lock: LockSpec,
}

impl PointService {
    /// Create the service.
    pub fn new(points: Arc<dyn PointRepository>, interceptor: LockInterceptor) -> Self {
        Self {
            points,
            interceptor,
            balance_lock: LockSpec::new(domain::USER_POINT, "id", ResourceIdExpr::arg("user_id")),
        }
    }

    /// Add `delta` (negative to spend) and return the new balance.
    pub async fn adjust(&self, user_id: UserId, delta: i64) -> Result<i64, PointError> {
        let args = LockArgs::new().with("user_id", &user_id)?;
        self.interceptor
            .around(&self.balance_lock, &args, || async {
                let balance = self.points.balance(user_id).await?;
                let updated = balance
                    .checked_add(delta)
                    .filter(|b| *b >= 0)
                    .ok_or(PointError::InsufficientPoints {
                        user_id,
                        balance,
                        delta,
                    })?;
                self.points.set_balance(user_id, updated).await?;
                debug!(user_id, delta, balance = updated, "Points adjusted");
                Ok(updated)
            })
            .await
    }

    /// Current balance, without locking.
    pub async fn balance(&self, user_id: UserId) -> Result<i64, PointError> {
        Ok(self.points.balance(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryPointRepository;
    use storefront_locks::{DistributedLockManager, MemoryLockStore};

    #[tokio::test]
    async fn test_earn_and_spend() {
        let service = PointService::new(
            Arc::new(InMemoryPointRepository::new()),
            LockInterceptor::new(DistributedLockManager::with_defaults(Arc::new(MemoryLockStore::new()))),
        );

        assert_eq!(service.adjust(1, 100).await.unwrap(), 100);
        assert_eq!(service.adjust(1, -30).await.unwrap(), 70);

        let err = service.adjust(1, -71).await.unwrap_err();
        assert!(matches!(
            err,
            PointError::InsufficientPoints {
                user_id: 1,
                balance: 70,
                delta: -71
            }
        ));
        assert!(!err.is_retryable());
        assert_eq!(service.balance(1).await.unwrap(), 70);
    }
}
