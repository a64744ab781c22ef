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

//! Lock key derivation.
//!
//! ## Purpose
//! Composes `{domain}:{resource-type}:{resource-id}` keys. Two calls with
//! the same triple always produce the same key, and distinct triples never
//! collide: the domain prefix and resource type may not contain the `:`
//! separator, so the split point of any key is unambiguous. The resource id
//! comes last and may contain any non-blank text.

use crate::{LockError, LockResult};
use serde::{Deserialize, Serialize};
use std::fmt;

const SEPARATOR: char = ':';

/// Domain prefixes used by the storefront services.
pub mod domain {
    /// Coupon event stock
    pub const COUPON_EVENT: &str = "coupon-event";
    /// Per-user coupon issuance
    pub const COUPON_USER: &str = "coupon-user";
    /// User point balance
    pub const USER_POINT: &str = "user-point";
    /// Product stock
    pub const PRODUCT_STOCK: &str = "product-stock";
    /// Order item ranking recomputation
    pub const ORDER_ITEM_RANK: &str = "order-item-rank";
}

/// Canonical lock key.
///
/// Ordering is the lexicographic order of the rendered string, which is the
/// global acquisition order for composite locks.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockKey(String);

impl LockKey {
    /// Build a key from its three components.
    ///
    /// ## Errors
    /// [`LockError::InvalidKeyComponent`] if any component is blank, or if
    /// the domain prefix or resource type contains `:`.
    pub fn generate(domain: &str, resource_type: &str, resource_id: &str) -> LockResult<Self> {
        check_component("domain", domain, true)?;
        check_component("resource_type", resource_type, true)?;
        check_component("resource_id", resource_id, false)?;
        Ok(Self(format!(
            "{domain}{SEPARATOR}{resource_type}{SEPARATOR}{resource_id}"
        )))
    }

    /// Rendered key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Domain prefix this key was built from.
    pub fn domain(&self) -> &str {
        self.0.split(SEPARATOR).next().unwrap_or_default()
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LockKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn check_component(component: &'static str, value: &str, reject_separator: bool) -> LockResult<()> {
    if value.trim().is_empty() {
        return Err(LockError::InvalidKeyComponent {
            component,
            reason: "must not be empty".to_string(),
        });
    }
    if reject_separator && value.contains(SEPARATOR) {
        return Err(LockError::InvalidKeyComponent {
            component,
            reason: format!("must not contain '{SEPARATOR}': {value}"),
        });
    }
    Ok(())
}

/// One resource of a composite lock request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainResource {
    /// Business area (see [`domain`])
    pub domain: String,
    /// Kind of entity
    pub resource_type: String,
    /// Specific instance
    pub resource_id: String,
}

impl DomainResource {
    /// Create a resource triple.
    pub fn new(
        domain: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
        }
    }

    /// Derive the lock key for this resource.
    pub fn lock_key(&self) -> LockResult<LockKey> {
        LockKey::generate(&self.domain, &self.resource_type, &self.resource_id)
    }
}
