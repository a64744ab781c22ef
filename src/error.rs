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

//! Error type for assembling the storefront runtime.

use storefront_locks::LockError;
use storefront_ranking::RankingError;
use thiserror::Error;

/// Result type for storefront assembly.
pub type StorefrontResult<T> = Result<T, StorefrontError>;

/// Errors raised while configuring or starting the storefront.
#[derive(Error, Debug)]
pub enum StorefrontError {
    /// Lock layer configuration or connection failure
    #[error("Lock layer error: {0}")]
    Lock(#[from] LockError),

    /// Ranking cache configuration or connection failure
    #[error("Ranking error: {0}")]
    Ranking(#[from] RankingError),

    /// Tracing subscriber could not be installed
    #[error("Tracing setup error: {0}")]
    Tracing(String),
}
