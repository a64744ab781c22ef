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

//! Redis-based ranking store implementation.
//!
//! ## Layout
//! - One string key per window: `{namespace}:ranking:{cache_key}`
//! - Value: JSON-encoded [`RankingSnapshot`]
//! - Expiry: native `PX` on every write
//!
//! `clear` walks the namespace with `SCAN` (never `KEYS`) and deletes in
//! batches.

use crate::{RankingError, RankingResult, RankingSnapshot, RankingStore};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use std::time::Duration;

const SCAN_BATCH: usize = 100;

/// Redis ranking store.
#[derive(Clone)]
pub struct RedisRankingStore {
    manager: ConnectionManager,
    namespace: String,
}

impl RedisRankingStore {
    /// Connect to Redis, e.g. `redis://127.0.0.1/`.
    pub async fn new(url: &str, namespace: &str) -> RankingResult<Self> {
        let client = Client::open(url)
            .map_err(|e| RankingError::Config(format!("invalid redis url {url}: {e}")))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| RankingError::Store(format!("failed to connect redis: {e}")))?;
        Ok(Self {
            manager,
            namespace: namespace.trim_end_matches(':').to_string(),
        })
    }

    fn prefix(&self) -> String {
        if self.namespace.is_empty() {
            "ranking:".to_string()
        } else {
            format!("{}:ranking:", self.namespace)
        }
    }

    fn prefixed_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix(), key)
    }
}

#[async_trait]
impl RankingStore for RedisRankingStore {
    async fn get(&self, key: &str) -> RankingResult<Option<RankingSnapshot>> {
        let mut conn = self.manager.clone();
        let payload: Option<String> = conn
            .get(self.prefixed_key(key))
            .await
            .map_err(|e| RankingError::Store(format!("Redis GET failed: {}", e)))?;
        payload
            .map(|json| serde_json::from_str(&json).map_err(RankingError::from))
            .transpose()
    }

    async fn put(&self, key: &str, snapshot: &RankingSnapshot, ttl: Duration) -> RankingResult<()> {
        let mut conn = self.manager.clone();
        let payload = serde_json::to_string(snapshot)?;
        let ttl_ms = ttl.as_millis().max(1) as u64;
        let _: () = redis::cmd("SET")
            .arg(self.prefixed_key(key))
            .arg(payload)
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| RankingError::Store(format!("Redis SET PX failed: {}", e)))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> RankingResult<()> {
        let mut conn = self.manager.clone();
        let _: i64 = conn
            .del(self.prefixed_key(key))
            .await
            .map_err(|e| RankingError::Store(format!("Redis DEL failed: {}", e)))?;
        Ok(())
    }

    async fn clear(&self) -> RankingResult<usize> {
        let mut conn = self.manager.clone();
        let pattern = format!("{}*", self.prefix());
        let mut cursor: u64 = 0;
        let mut removed = 0usize;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| RankingError::Store(format!("Redis SCAN failed: {}", e)))?;

            if !keys.is_empty() {
                let deleted: usize = conn
                    .del(keys)
                    .await
                    .map_err(|e| RankingError::Store(format!("Redis DEL failed: {}", e)))?;
                removed += deleted;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(removed)
    }
}
