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

//! Error types for ranking cache operations.

use storefront_locks::LockError;
use thiserror::Error;

/// Result type for ranking operations.
pub type RankingResult<T> = Result<T, RankingError>;

/// Errors that can occur while serving or refreshing rankings.
#[derive(Error, Debug)]
pub enum RankingError {
    /// Lock layer failure (timeout, store unavailable, ...)
    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    /// Aggregation source failure
    #[error("Aggregation source error: {0}")]
    Source(String),

    /// Cache store failure
    #[error("Ranking store error: {0}")]
    Store(String),

    /// Window with zero days or zero limit
    #[error("Invalid ranking window: days={days}, limit={limit}")]
    InvalidWindow {
        /// Requested days
        days: u32,
        /// Requested limit
        limit: usize,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RankingError {
    /// Whether retrying later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            RankingError::Lock(e) => e.is_retryable(),
            RankingError::Source(_) | RankingError::Store(_) => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for RankingError {
    fn from(err: serde_json::Error) -> Self {
        RankingError::Serialization(err.to_string())
    }
}

#[cfg(feature = "redis-backend")]
impl From<redis::RedisError> for RankingError {
    fn from(err: redis::RedisError) -> Self {
        RankingError::Store(format!("Redis error: {}", err))
    }
}
