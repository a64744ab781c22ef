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

//! In-memory ranking store implementation.
//!
//! ## Limitations
//! - Not persistent (entries lost on restart)
//! - Not distributed (single process only)
//! - Expired entries are hidden on read and dropped on the next write

use crate::{RankingResult, RankingSnapshot, RankingStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Entry in the in-memory store with its expiry.
#[derive(Debug, Clone)]
struct Entry {
    snapshot: RankingSnapshot,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// HashMap-backed ranking store guarded by a tokio `RwLock`.
#[derive(Clone, Default)]
pub struct MemoryRankingStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryRankingStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.values().filter(|e| !e.is_expired()).count()
    }

    /// Whether no live entries exist.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl RankingStore for MemoryRankingStore {
    async fn get(&self, key: &str) -> RankingResult<Option<RankingSnapshot>> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => Ok(Some(entry.snapshot.clone())),
            _ => Ok(None),
        }
    }

    async fn put(&self, key: &str, snapshot: &RankingSnapshot, ttl: Duration) -> RankingResult<()> {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| !entry.is_expired());
        entries.insert(
            key.to_string(),
            Entry {
                snapshot: snapshot.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> RankingResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> RankingResult<usize> {
        let mut entries = self.entries.write().await;
        let removed = entries.values().filter(|e| !e.is_expired()).count();
        entries.clear();
        Ok(removed)
    }
}
