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

//! # Tracing Setup
//!
//! ## Configuration
//! - `RUST_LOG`: Log level filter (e.g. "info", "storefront_locks=debug")
//!
//! Lock acquisition and release log at `debug`; contention fallbacks and
//! failed refreshes at `warn`.

use crate::{StorefrontError, StorefrontResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber: `EnvFilter` from `RUST_LOG` (default
/// `info`) and a fmt layer.
///
/// ## Errors
/// [`StorefrontError::Tracing`] if a global subscriber is already set.
pub fn init_tracing() -> StorefrontResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| StorefrontError::Tracing(e.to_string()))?;

    tracing::info!("Tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice_is_an_error() {
        // The first call may lose to another test's subscriber; the second never succeeds.
        let _ = init_tracing();
        assert!(matches!(init_tracing(), Err(StorefrontError::Tracing(_))));
    }
}
