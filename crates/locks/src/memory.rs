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

//! In-memory lock store implementation (for testing).

use crate::{LockKey, LockResult, LockStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Entry held for a locked key.
#[derive(Debug, Clone)]
struct Entry {
    owner_token: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory lock store (for testing).
///
/// ## Purpose
/// Provides a HashMap-based implementation of [`LockStore`] for tests and
/// single-process deployments. Clones share the same map, so handing clones
/// to several lock managers simulates several application instances talking
/// to one shared store.
///
/// ## Limitations
/// - Not persistent (locks lost on restart)
/// - Not distributed (single process only)
/// - Expired entries are replaced lazily on the next acquisition
#[derive(Clone, Default)]
pub struct MemoryLockStore {
    locks: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryLockStore {
    /// Create a new in-memory lock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Owner token currently holding `key`, if any.
    pub async fn owner_of(&self, key: &LockKey) -> Option<String> {
        let locks = self.locks.read().await;
        locks
            .get(key.as_str())
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.owner_token.clone())
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn set_if_absent(&self, key: &LockKey, owner_token: &str, ttl: Duration) -> LockResult<bool> {
        let mut locks = self.locks.write().await;
        if let Some(existing) = locks.get(key.as_str()) {
            if !existing.is_expired() {
                return Ok(false);
            }
        }
        locks.insert(
            key.as_str().to_string(),
            Entry {
                owner_token: owner_token.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(true)
    }

    async fn compare_and_delete(&self, key: &LockKey, owner_token: &str) -> LockResult<bool> {
        let mut locks = self.locks.write().await;
        match locks.get(key.as_str()) {
            Some(existing) if existing.owner_token == owner_token && !existing.is_expired() => {
                locks.remove(key.as_str());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn exists(&self, key: &LockKey) -> LockResult<bool> {
        let locks = self.locks.read().await;
        Ok(locks.get(key.as_str()).is_some_and(|entry| !entry.is_expired()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str) -> LockKey {
        LockKey::generate("test", "id", id).unwrap()
    }

    #[tokio::test]
    async fn test_set_if_absent() {
        let store = MemoryLockStore::new();
        assert!(store.set_if_absent(&key("1"), "owner-1", Duration::from_secs(30)).await.unwrap());
        assert!(store.exists(&key("1")).await.unwrap());
        assert_eq!(store.owner_of(&key("1")).await.as_deref(), Some("owner-1"));
    }

    #[tokio::test]
    async fn test_set_if_absent_already_held() {
        let store = MemoryLockStore::new();
        assert!(store.set_if_absent(&key("1"), "owner-1", Duration::from_secs(30)).await.unwrap());
        assert!(!store.set_if_absent(&key("1"), "owner-2", Duration::from_secs(30)).await.unwrap());
        // Re-entry by the same token is still contention
        assert!(!store.set_if_absent(&key("1"), "owner-1", Duration::from_secs(30)).await.unwrap());
    }

    #[tokio::test]
    async fn test_compare_and_delete_owner() {
        let store = MemoryLockStore::new();
        store.set_if_absent(&key("1"), "owner-1", Duration::from_secs(30)).await.unwrap();

        assert!(!store.compare_and_delete(&key("1"), "owner-2").await.unwrap());
        assert!(store.exists(&key("1")).await.unwrap());

        assert!(store.compare_and_delete(&key("1"), "owner-1").await.unwrap());
        assert!(!store.exists(&key("1")).await.unwrap());

        // Second release is a no-op
        assert!(!store.compare_and_delete(&key("1"), "owner-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_lock_reacquired_by_other_owner() {
        let store = MemoryLockStore::new();
        store.set_if_absent(&key("1"), "owner-1", Duration::from_millis(20)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!store.exists(&key("1")).await.unwrap());

        assert!(store.set_if_absent(&key("1"), "owner-2", Duration::from_secs(30)).await.unwrap());

        // The stale owner must not release the new holder's lock
        assert!(!store.compare_and_delete(&key("1"), "owner-1").await.unwrap());
        assert_eq!(store.owner_of(&key("1")).await.as_deref(), Some("owner-2"));
    }

    #[tokio::test]
    async fn test_concurrent_set_if_absent() {
        let store = MemoryLockStore::new();
        let mut handles = vec![];

        for i in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .set_if_absent(&key("concurrent"), &format!("owner-{}", i), Duration::from_secs(30))
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
