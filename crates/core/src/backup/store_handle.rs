//! Owned handle to the live local store.
//!
//! Ordinary readers and backup encoding take shared leases. Restore takes
//! the exclusive lease and holds it across close, overwrite, and reopen, so
//! nobody can observe the store while its files are being replaced.

use eventtracker_domain::{EventTrackerError, Result};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::ports::LocalStore;

/// Shared access to the store.
pub type SharedLease<'a, S> = RwLockReadGuard<'a, S>;

/// Exclusive access to the store, required for close and reopen.
pub type ExclusiveLease<'a, S> = RwLockWriteGuard<'a, S>;

#[derive(Debug)]
pub struct StoreHandle<S: LocalStore> {
    inner: RwLock<S>,
}

impl<S: LocalStore> StoreHandle<S> {
    pub fn new(store: S) -> Self {
        Self { inner: RwLock::new(store) }
    }

    /// Wait for shared access.
    pub async fn shared(&self) -> SharedLease<'_, S> {
        self.inner.read().await
    }

    /// Shared access, failing if an exclusive lease is live.
    ///
    /// # Errors
    /// Returns `Database` when a restore holds the store.
    pub fn try_shared(&self) -> Result<SharedLease<'_, S>> {
        self.inner
            .try_read()
            .map_err(|_| EventTrackerError::Database("store is being restored".to_string()))
    }

    /// Wait until every other lease is released.
    pub async fn exclusive(&self) -> ExclusiveLease<'_, S> {
        self.inner.write().await
    }

    /// Exclusive access, failing immediately if any lease is live.
    ///
    /// # Errors
    /// Returns `Database` when another lease is held.
    pub fn try_exclusive(&self) -> Result<ExclusiveLease<'_, S>> {
        self.inner
            .try_write()
            .map_err(|_| EventTrackerError::Database("store is in use".to_string()))
    }

    /// Consume the handle and return the store.
    pub fn into_inner(self) -> S {
        self.inner.into_inner()
    }
}
