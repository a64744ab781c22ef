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

//! Error types for distributed lock operations.

use std::time::Duration;
use thiserror::Error;

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;

/// Errors that can occur during lock operations.
///
/// These are lock-layer failures only. Business errors raised inside a
/// protected body never pass through this type; they are returned to the
/// caller unchanged after the lock is released.
#[derive(Error, Debug)]
pub enum LockError {
    /// Empty or malformed input to key generation (caller bug, never retried)
    #[error("Invalid lock key component `{component}`: {reason}")]
    InvalidKeyComponent {
        /// Which component was rejected (domain, resource type, resource id)
        component: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// A lock spec could not resolve a resource id from the call arguments
    #[error("Resource id resolution failed: {0}")]
    ResourceIdResolution(String),

    /// The lock stayed contended for longer than the wait timeout
    #[error("Timed out after {waited:?} waiting for lock: {key}")]
    AcquisitionTimeout {
        /// Derived lock key
        key: String,
        /// How long the caller waited before giving up
        waited: Duration,
    },

    /// The shared lock store could not be reached (fail closed)
    #[error("Lock store unavailable: {0}")]
    StoreUnavailable(String),

    /// One lock of a composite request failed after others were acquired.
    /// Every lock acquired by that request has been released.
    #[error("Composite lock failed at {failed_key} after acquiring {acquired} lock(s): {source}")]
    PartialAcquisition {
        /// Key whose acquisition failed
        failed_key: String,
        /// Number of locks held (and released) before the failure
        acquired: usize,
        /// Underlying failure
        #[source]
        source: Box<LockError>,
    },

    /// Serialization error (call arguments, store payloads)
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LockError {
    /// Whether the failure is transient contention that a caller may retry
    /// with backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            LockError::AcquisitionTimeout { .. } | LockError::StoreUnavailable(_) => true,
            LockError::PartialAcquisition { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Whether the failure was an acquisition timeout, directly or inside a
    /// composite request.
    pub fn is_timeout(&self) -> bool {
        match self {
            LockError::AcquisitionTimeout { .. } => true,
            LockError::PartialAcquisition { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for LockError {
    fn from(err: serde_json::Error) -> Self {
        LockError::Serialization(err.to_string())
    }
}

#[cfg(feature = "redis-backend")]
impl From<redis::RedisError> for LockError {
    fn from(err: redis::RedisError) -> Self {
        LockError::StoreUnavailable(format!("Redis error: {}", err))
    }
}
