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

//! Distributed lock manager: timeout-bounded acquisition, owner-checked
//! release and deadlock-free multi-key locking on top of a [`LockStore`].

use crate::{DomainResource, LockError, LockKey, LockResult, LockStore};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use ulid::Ulid;

/// Lock manager tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockManagerConfig {
    /// Lease written with each lock; a holder that dies loses the lock after this
    pub lease_ttl: Duration,
    /// Polling interval while a key is contended
    pub retry_interval: Duration,
    /// Wait timeout used by lock specs that do not set their own
    pub default_wait_timeout: Duration,
}

impl Default for LockManagerConfig {
    fn default() -> Self {
        Self {
            lease_ttl: Duration::from_secs(30),
            retry_interval: Duration::from_millis(50),
            default_wait_timeout: Duration::from_secs(3),
        }
    }
}

/// An acquired lock.
///
/// The owner token is unique per acquisition; release is conditioned on it,
/// so a handle whose lease expired can never release a later holder's lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle {
    key: LockKey,
    owner_token: String,
    wait_timeout: Duration,
    lease_ttl: Duration,
    acquired_at: DateTime<Utc>,
}

impl LockHandle {
    /// Locked key.
    pub fn key(&self) -> &LockKey {
        &self.key
    }

    /// Opaque ownership token.
    pub fn owner_token(&self) -> &str {
        &self.owner_token
    }

    /// Wait timeout requested by the acquirer.
    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    /// Lease written to the store.
    pub fn lease_ttl(&self) -> Duration {
        self.lease_ttl
    }

    /// When the lock was acquired.
    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }
}

/// Releases held locks in reverse acquisition order.
///
/// Normal exits call [`ReleaseGuard::release_all`]. If the guard is dropped
/// while still holding locks (the protected future panicked or was
/// cancelled), release is spawned onto the current runtime; without a
/// runtime the lease TTL reclaims the keys.
struct ReleaseGuard {
    store: Arc<dyn LockStore>,
    handles: Vec<LockHandle>,
}

impl ReleaseGuard {
    fn new(store: Arc<dyn LockStore>) -> Self {
        Self {
            store,
            handles: Vec::new(),
        }
    }

    fn push(&mut self, handle: LockHandle) {
        self.handles.push(handle);
    }

    fn len(&self) -> usize {
        self.handles.len()
    }

    async fn release_all(mut self) {
        let handles = std::mem::take(&mut self.handles);
        for handle in handles.iter().rev() {
            release_handle(self.store.as_ref(), handle).await;
        }
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        spawn_release(self.store.clone(), std::mem::take(&mut self.handles));
    }
}

/// A single lock taken with [`DistributedLockManager::try_domain_lock_guard`].
///
/// Release with [`DomainLockGuard::unlock`]. A guard dropped while still
/// held (the holder panicked or its future was cancelled) spawns the release
/// onto the current runtime.
pub struct DomainLockGuard {
    store: Arc<dyn LockStore>,
    handle: LockHandle,
    released: bool,
}

impl DomainLockGuard {
    /// The held lock.
    pub fn handle(&self) -> &LockHandle {
        &self.handle
    }

    /// Release the lock. Returns whether the store entry was deleted.
    pub async fn unlock(mut self) -> bool {
        let deleted = release_handle(self.store.as_ref(), &self.handle).await;
        self.released = true;
        deleted
    }
}

impl Drop for DomainLockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        debug!(key = %self.handle.key, "Lock guard dropped while held");
        spawn_release(self.store.clone(), vec![self.handle.clone()]);
    }
}

fn spawn_release(store: Arc<dyn LockStore>, handles: Vec<LockHandle>) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(async move {
                for handle in handles.iter().rev() {
                    release_handle(store.as_ref(), handle).await;
                }
            });
        }
        Err(_) => {
            for handle in &handles {
                warn!(key = %handle.key, "No runtime to release lock, leaving it to expire");
            }
        }
    }
}

async fn release_handle(store: &dyn LockStore, handle: &LockHandle) -> bool {
    match store.compare_and_delete(&handle.key, &handle.owner_token).await {
        Ok(true) => {
            metrics::counter!("storefront_lock_release_total", "result" => "released").increment(1);
            debug!(key = %handle.key, "Lock released");
            true
        }
        Ok(false) => {
            metrics::counter!("storefront_lock_release_total", "result" => "not_held").increment(1);
            debug!(key = %handle.key, "Lock already released or expired");
            false
        }
        Err(e) => {
            metrics::counter!("storefront_lock_release_total", "result" => "error").increment(1);
            warn!(key = %handle.key, error = %e, "Failed to release lock, relying on lease expiry");
            false
        }
    }
}

/// Distributed lock manager.
///
/// ## Purpose
/// Orchestrates acquisition and release against a shared [`LockStore`]:
/// single-key locks bounded by a wait timeout, explicit try/unlock for
/// callers that branch on contention, and multi-key locks acquired in a
/// globally consistent order.
///
/// ## Failure semantics
/// - Contention beyond the timeout: [`LockError::AcquisitionTimeout`], the
///   protected operation does not run
/// - Store unreachable: [`LockError::StoreUnavailable`] (fail closed)
/// - Release failures are logged, never returned; the lease TTL is the
///   safety net
///
/// Cloning is cheap; clones share the store.
#[derive(Clone)]
pub struct DistributedLockManager {
    store: Arc<dyn LockStore>,
    config: LockManagerConfig,
}

impl DistributedLockManager {
    /// Create a manager over `store`.
    pub fn new(store: Arc<dyn LockStore>, config: LockManagerConfig) -> Self {
        Self { store, config }
    }

    /// Create a manager with default tuning.
    pub fn with_defaults(store: Arc<dyn LockStore>) -> Self {
        Self::new(store, LockManagerConfig::default())
    }

    /// Manager tuning.
    pub fn config(&self) -> &LockManagerConfig {
        &self.config
    }

    /// Acquire `key`, polling until `timeout` elapses.
    ///
    /// A zero timeout makes exactly one attempt.
    pub async fn acquire(&self, key: &LockKey, timeout: Duration) -> LockResult<LockHandle> {
        let owner_token = Ulid::new().to_string();
        let started = Instant::now();

        loop {
            match self.store.set_if_absent(key, &owner_token, self.config.lease_ttl).await {
                Ok(true) => {
                    let waited = started.elapsed();
                    metrics::counter!("storefront_lock_acquire_total", "result" => "acquired").increment(1);
                    metrics::histogram!("storefront_lock_wait_seconds").record(waited.as_secs_f64());
                    debug!(key = %key, waited_ms = waited.as_millis() as u64, "Lock acquired");
                    return Ok(LockHandle {
                        key: key.clone(),
                        owner_token,
                        wait_timeout: timeout,
                        lease_ttl: self.config.lease_ttl,
                        acquired_at: Utc::now(),
                    });
                }
                Ok(false) => {}
                Err(e) => {
                    metrics::counter!("storefront_lock_acquire_total", "result" => "store_error").increment(1);
                    warn!(key = %key, error = %e, "Lock store error during acquisition");
                    return Err(match e {
                        LockError::StoreUnavailable(_) => e,
                        other => LockError::StoreUnavailable(other.to_string()),
                    });
                }
            }

            let waited = started.elapsed();
            if waited >= timeout {
                metrics::counter!("storefront_lock_acquire_total", "result" => "timeout").increment(1);
                debug!(key = %key, waited_ms = waited.as_millis() as u64, "Lock acquisition timed out");
                return Err(LockError::AcquisitionTimeout {
                    key: key.to_string(),
                    waited,
                });
            }
            let remaining = timeout - waited;
            tokio::time::sleep(self.config.retry_interval.min(remaining)).await;
        }
    }

    /// Release a handle. Returns whether the store entry was deleted.
    ///
    /// Idempotent: a handle that was already released, expired, or taken
    /// over by another owner is a no-op.
    pub async fn release(&self, handle: &LockHandle) -> bool {
        release_handle(self.store.as_ref(), handle).await
    }

    /// Whether `key` is currently held by anyone.
    pub async fn is_locked(&self, key: &LockKey) -> LockResult<bool> {
        self.store.exists(key).await
    }

    /// Run `operation` while holding the lock for `(domain, resource_type, resource_id)`.
    ///
    /// The lock is released on every exit path: success, business error,
    /// panic, or cancellation of the returned future. Lock-layer failures are
    /// converted into `E` through `From<LockError>`; business errors are
    /// returned unchanged.
    pub async fn execute_with_domain_lock<T, E, F, Fut>(
        &self,
        domain: &str,
        resource_type: &str,
        resource_id: &str,
        timeout: Duration,
        operation: F,
    ) -> Result<T, E>
    where
        E: From<LockError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = LockKey::generate(domain, resource_type, resource_id)?;
        self.with_lock(&key, timeout, operation).await
    }

    /// Run `operation` while holding `key`.
    pub async fn with_lock<T, E, F, Fut>(&self, key: &LockKey, timeout: Duration, operation: F) -> Result<T, E>
    where
        E: From<LockError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let handle = self.acquire(key, timeout).await?;
        let mut guard = ReleaseGuard::new(self.store.clone());
        guard.push(handle);

        let result = operation().await;
        guard.release_all().await;
        result
    }

    /// Try to acquire `(domain, resource_type, resource_id)` within `timeout`
    /// without running anything.
    ///
    /// ## Returns
    /// - `Ok(Some(handle))`: acquired; release with [`unlock_domain`](Self::unlock_domain)
    /// - `Ok(None)`: still contended when the timeout elapsed
    /// - `Err(..)`: invalid key or store unavailable
    pub async fn try_domain_lock(
        &self,
        domain: &str,
        resource_type: &str,
        resource_id: &str,
        timeout: Duration,
    ) -> LockResult<Option<LockHandle>> {
        let key = LockKey::generate(domain, resource_type, resource_id)?;
        match self.acquire(&key, timeout).await {
            Ok(handle) => Ok(Some(handle)),
            Err(LockError::AcquisitionTimeout { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Like [`try_domain_lock`](Self::try_domain_lock), but the lock is
    /// released when the returned guard is dropped.
    pub async fn try_domain_lock_guard(
        &self,
        domain: &str,
        resource_type: &str,
        resource_id: &str,
        timeout: Duration,
    ) -> LockResult<Option<DomainLockGuard>> {
        let handle = self.try_domain_lock(domain, resource_type, resource_id, timeout).await?;
        Ok(handle.map(|handle| DomainLockGuard {
            store: self.store.clone(),
            handle,
            released: false,
        }))
    }

    /// Release a lock taken with [`try_domain_lock`](Self::try_domain_lock).
    ///
    /// Idempotent and infallible from the caller's point of view.
    pub async fn unlock_domain(&self, handle: &LockHandle) -> bool {
        self.release(handle).await
    }

    /// Acquire every key in the given order, run `operation`, release in
    /// reverse order.
    ///
    /// Each acquisition waits at most `timeout`. Duplicate keys are collapsed
    /// to their first occurrence. If an acquisition fails after others
    /// succeeded, the held locks are released before
    /// [`LockError::PartialAcquisition`] is returned.
    pub async fn with_ordered_locks<T, E, F, Fut>(
        &self,
        keys: &[LockKey],
        timeout: Duration,
        operation: F,
    ) -> Result<T, E>
    where
        E: From<LockError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut unique: Vec<&LockKey> = Vec::with_capacity(keys.len());
        for key in keys {
            if !unique.contains(&key) {
                unique.push(key);
            }
        }

        let mut guard = ReleaseGuard::new(self.store.clone());
        for key in unique {
            match self.acquire(key, timeout).await {
                Ok(handle) => guard.push(handle),
                Err(err) => {
                    let acquired = guard.len();
                    guard.release_all().await;
                    if acquired == 0 {
                        return Err(err.into());
                    }
                    warn!(
                        failed_key = %key,
                        acquired,
                        error = %err,
                        "Composite lock failed, released partially acquired locks"
                    );
                    return Err(LockError::PartialAcquisition {
                        failed_key: key.to_string(),
                        acquired,
                        source: Box::new(err),
                    }
                    .into());
                }
            }
        }

        let result = operation().await;
        guard.release_all().await;
        result
    }

    /// Lock several domain resources together.
    ///
    /// With `ordered = true` the derived keys are sorted by
    /// [`sort_lock_keys`](Self::sort_lock_keys) regardless of input order, so
    /// callers naming the same set in different orders cannot deadlock.
    pub async fn with_domain_locks<T, E, F, Fut>(
        &self,
        resources: &[DomainResource],
        timeout: Duration,
        ordered: bool,
        operation: F,
    ) -> Result<T, E>
    where
        E: From<LockError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut keys = resources
            .iter()
            .map(DomainResource::lock_key)
            .collect::<LockResult<Vec<_>>>()?;
        if ordered {
            keys = Self::sort_lock_keys(keys);
        }
        self.with_ordered_locks(&keys, timeout, operation).await
    }

    /// Lock many ids of one domain and resource type (always ordered).
    pub async fn with_same_domain_locks<T, E, F, Fut, I>(
        &self,
        domain: &str,
        resource_type: &str,
        resource_ids: &[I],
        timeout: Duration,
        operation: F,
    ) -> Result<T, E>
    where
        I: AsRef<str>,
        E: From<LockError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let resources: Vec<DomainResource> = resource_ids
            .iter()
            .map(|id| DomainResource::new(domain, resource_type, id.as_ref()))
            .collect();
        self.with_domain_locks(&resources, timeout, true, operation).await
    }

    /// Global acquisition order: lexicographic on the rendered key, duplicates removed.
    pub fn sort_lock_keys(mut keys: Vec<LockKey>) -> Vec<LockKey> {
        keys.sort();
        keys.dedup();
        keys
    }
}
