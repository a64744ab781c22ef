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

//! Redis-based lock store implementation.
//!
//! ## Purpose
//! TTL-based distributed lock store on a single shared Redis instance.
//!
//! ## Primitives
//! - Acquire: `SET key token NX PX ttl`
//! - Release: Lua compare-and-delete (`GET` + `DEL` only when the token matches)
//! - Probe: `EXISTS`
//!
//! A single Redis node is assumed to be sufficient; there is no multi-node
//! quorum.

use crate::{LockError, LockKey, LockResult, LockStore};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, Script};
use std::time::Duration;

const COMPARE_AND_DELETE: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Redis lock store.
///
/// ## Design Decisions
/// - **ConnectionManager**: automatic reconnection, cheap to clone per call
/// - **Namespace prefix**: several deployments can share one Redis instance
/// - **Native PX expiry**: a crashed holder's lock self-expires
#[derive(Clone)]
pub struct RedisLockStore {
    manager: ConnectionManager,
    namespace: String,
    release_script: Script,
}

impl RedisLockStore {
    /// Connect to Redis.
    ///
    /// Example URLs:
    /// - `redis://127.0.0.1/`
    /// - `rediss://host:6379/`
    pub async fn new(url: &str, namespace: &str) -> LockResult<Self> {
        let client = Client::open(url)
            .map_err(|e| LockError::Config(format!("invalid redis url {url}: {e}")))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| LockError::StoreUnavailable(format!("failed to connect redis: {e}")))?;
        Ok(Self {
            manager,
            namespace: namespace.trim_end_matches(':').to_string(),
            release_script: Script::new(COMPARE_AND_DELETE),
        })
    }

    fn prefixed_key(&self, key: &LockKey) -> String {
        if self.namespace.is_empty() {
            format!("lock:{}", key)
        } else {
            format!("{}:lock:{}", self.namespace, key)
        }
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn set_if_absent(&self, key: &LockKey, owner_token: &str, ttl: Duration) -> LockResult<bool> {
        let mut conn = self.manager.clone();
        let ttl_ms = ttl.as_millis().max(1) as u64;
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.prefixed_key(key))
            .arg(owner_token)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError::StoreUnavailable(format!("Redis SET NX failed: {}", e)))?;
        Ok(reply.is_some())
    }

    async fn compare_and_delete(&self, key: &LockKey, owner_token: &str) -> LockResult<bool> {
        let mut conn = self.manager.clone();
        let deleted: i64 = self
            .release_script
            .key(self.prefixed_key(key))
            .arg(owner_token)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| LockError::StoreUnavailable(format!("Redis compare-and-delete failed: {}", e)))?;
        Ok(deleted == 1)
    }

    async fn exists(&self, key: &LockKey) -> LockResult<bool> {
        let mut conn = self.manager.clone();
        let exists: bool = conn
            .exists(self.prefixed_key(key))
            .await
            .map_err(|e| LockError::StoreUnavailable(format!("Redis EXISTS failed: {}", e)))?;
        Ok(exists)
    }
}
