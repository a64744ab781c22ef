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

//! Scheduled refresh driver (refresh-ahead).
//!
//! ## Purpose
//! Recomputes the configured ranking windows on a fixed interval shorter
//! than the cache TTL, so readers rarely observe a miss.
//!
//! ## Design
//! - One background task driven by `tokio::time::interval`
//! - Each tick refreshes every window; failures are logged and the loop
//!   continues (a missed refresh degrades to recompute-on-miss)
//! - Shutdown through `Notify`

use crate::{RankingCache, RankingError, RankingResult, RankingWindow};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Periodically refreshes ranking windows.
pub struct RankingRefreshDriver {
    cache: Arc<RankingCache>,
    windows: Vec<RankingWindow>,
    interval: Duration,
    shutdown: Arc<Notify>,
}

impl RankingRefreshDriver {
    /// Create a driver.
    ///
    /// ## Errors
    /// [`RankingError::Config`] when `interval` is zero or not shorter than
    /// the cache TTL.
    pub fn new(cache: Arc<RankingCache>, windows: Vec<RankingWindow>, interval: Duration) -> RankingResult<Self> {
        if interval.is_zero() {
            return Err(RankingError::Config("refresh interval must be positive".to_string()));
        }
        let ttl = cache.config().ttl;
        if interval >= ttl {
            return Err(RankingError::Config(format!(
                "refresh interval {:?} must be shorter than cache ttl {:?}",
                interval, ttl
            )));
        }
        Ok(Self {
            cache,
            windows,
            interval,
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Windows refreshed on every tick.
    pub fn windows(&self) -> &[RankingWindow] {
        &self.windows
    }

    /// Tick interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the refresh loop. The first tick fires immediately.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let driver = Arc::clone(self);
        tokio::spawn(async move {
            info!(
                windows = driver.windows.len(),
                interval_ms = driver.interval.as_millis() as u64,
                "Ranking refresh driver started"
            );
            let mut ticker = interval(driver.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = driver.shutdown.notified() => break,
                    _ = ticker.tick() => {
                        driver.refresh_once().await;
                    }
                }
            }
            info!("Ranking refresh driver stopped");
        })
    }

    /// Signal the loop to stop after the current tick.
    pub fn stop(&self) {
        // notify_one stores a permit, so a stop issued mid-tick is not lost
        self.shutdown.notify_one();
    }

    /// Refresh every window once. Returns how many succeeded.
    pub async fn refresh_once(&self) -> usize {
        let mut refreshed = 0;
        for window in &self.windows {
            match self.cache.refresh(window.days, window.limit).await {
                Ok(snapshot) => {
                    refreshed += 1;
                    debug!(window = %window, items = snapshot.items.len(), "Scheduled ranking refresh done");
                }
                Err(e) => {
                    warn!(window = %window, error = %e, "Scheduled ranking refresh failed");
                }
            }
        }
        refreshed
    }
}
