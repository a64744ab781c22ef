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

//! Coupon stock and coupon issuance.
//!
//! - [`CouponStockService::decrease_stock`] locks `coupon-event:id:{event_id}`
//! - [`CouponIssueService::issue`] locks the event and the
//!   `coupon-user:id:{event_id}_{user_id}` pair together

use crate::repository::{CouponEventId, CouponRepository, RepositoryError, UserId};
use serde::Serialize;
use std::sync::Arc;
use storefront_locks::{domain, LockArgs, LockError, LockInterceptor, LockSpec, ResourceIdExpr};
use thiserror::Error;
use tracing::debug;

/// Coupon operation failure.
#[derive(Error, Debug)]
pub enum CouponError {
    /// Unknown coupon event
    #[error("Coupon event {0} not found")]
    EventNotFound(CouponEventId),

    /// No coupons left
    #[error("Coupon event {0} is out of stock")]
    OutOfStock(CouponEventId),

    /// The user already holds a coupon from this event
    #[error("User {user_id} already holds a coupon from event {event_id}")]
    AlreadyIssued {
        /// Coupon event
        event_id: CouponEventId,
        /// User
        user_id: UserId,
    },

    /// Repository failure
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Lock contention or lock store failure
    #[error("Lock error: {0}")]
    Lock(#[from] LockError),
}

impl CouponError {
    /// Whether the failure came from the lock layer and a retry may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CouponError::Lock(e) if e.is_retryable())
    }
}

/// Decrements coupon event stock one coupon at a time.
pub struct CouponStockService {
    coupons: Arc<dyn CouponRepository>,
    interceptor: LockInterceptor,
    decrease_lock: LockSpec,
}

impl CouponStockService {
    /// Create the service.
    pub fn new(coupons: Arc<dyn CouponRepository>, interceptor: LockInterceptor) -> Self {
        Self {
            coupons,
            interceptor,
            decrease_lock: LockSpec::new(domain::COUPON_EVENT, "id", ResourceIdExpr::arg("event_id")),
        }
    }

    /// Take one coupon from `event_id`, returning the remaining stock.
    ///
    /// ## Errors
    /// - [`CouponError::OutOfStock`] when the stock is already zero
    /// - [`CouponError::Lock`] when the event lock could not be taken
    pub async fn decrease_stock(&self, event_id: CouponEventId) -> Result<u32, CouponError> {
        let args = LockArgs::new().with("event_id", &event_id)?;
        self.interceptor
            .around(&self.decrease_lock, &args, || async {
                let stock = self
                    .coupons
                    .stock(event_id)
                    .await?
                    .ok_or(CouponError::EventNotFound(event_id))?;
                if stock == 0 {
                    return Err(CouponError::OutOfStock(event_id));
                }
                self.coupons.set_stock(event_id, stock - 1).await?;
                debug!(event_id, remaining = stock - 1, "Coupon stock decreased");
                Ok(stock - 1)
            })
            .await
    }

    /// Current stock, without locking.
    pub async fn stock(&self, event_id: CouponEventId) -> Result<Option<u32>, CouponError> {
        Ok(self.coupons.stock(event_id).await?)
    }
}

/// Coupon issue request.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct IssueCouponRequest {
    /// Coupon event
    pub event_id: CouponEventId,
    /// Receiving user
    pub user_id: UserId,
}

/// Issues at most one coupon per user and event.
pub struct CouponIssueService {
    coupons: Arc<dyn CouponRepository>,
    interceptor: LockInterceptor,
    issue_locks: [LockSpec; 2],
}

impl CouponIssueService {
    /// Create the service.
    pub fn new(coupons: Arc<dyn CouponRepository>, interceptor: LockInterceptor) -> Self {
        let event_lock = LockSpec::new(domain::COUPON_EVENT, "id", ResourceIdExpr::path("request.event_id"));
        let user_lock = LockSpec::new(
            domain::COUPON_USER,
            "id",
            ResourceIdExpr::concat([
                ResourceIdExpr::path("request.event_id"),
                ResourceIdExpr::literal("_"),
                ResourceIdExpr::path("request.user_id"),
            ]),
        );
        Self {
            coupons,
            interceptor,
            issue_locks: [event_lock, user_lock],
        }
    }

    /// Issue one coupon of `request.event_id` to `request.user_id`,
    /// returning the remaining stock.
    ///
    /// ## Errors
    /// - [`CouponError::AlreadyIssued`] on a second request by the same user
    /// - [`CouponError::OutOfStock`] when the event has no coupons left
    pub async fn issue(&self, request: IssueCouponRequest) -> Result<u32, CouponError> {
        let args = LockArgs::new().with("request", &request)?;
        let IssueCouponRequest { event_id, user_id } = request;

        self.interceptor
            .around_all(&self.issue_locks, &args, || async {
                if self.coupons.is_issued(event_id, user_id).await? {
                    return Err(CouponError::AlreadyIssued { event_id, user_id });
                }
                let stock = self
                    .coupons
                    .stock(event_id)
                    .await?
                    .ok_or(CouponError::EventNotFound(event_id))?;
                if stock == 0 {
                    return Err(CouponError::OutOfStock(event_id));
                }
                self.coupons.set_stock(event_id, stock - 1).await?;
                self.coupons.record_issue(event_id, user_id).await?;
                debug!(event_id, user_id, remaining = stock - 1, "Coupon issued");
                Ok(stock - 1)
            })
            .await
    }
}
