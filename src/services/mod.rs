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

//! Domain services whose read-validate-write units of work run under
//! distributed locks.
//!
//! Each service returns its own error enum. A `Lock` variant carries
//! contention and lock store failures; every other variant is a business
//! rejection and is returned unchanged after the lock is released.

pub mod coupon;
pub mod point;
pub mod product;

pub use coupon::{CouponError, CouponIssueService, CouponStockService, IssueCouponRequest};
pub use point::{PointError, PointService};
pub use product::{ProductError, ProductStockService};
