//! Binding store: the mapping from API key to device binding.
//!
//! The store is shared by the request-path guard and the management
//! handlers. Each operation runs as one critical section (a single lock
//! acquisition or a single SQL statement), which makes every mutation
//! linearizable with respect to other operations on the same key.
//!
//! Ban fields are only written by `save`, `ban` and `unban`. A concurrent
//! `update_last_seen` therefore never undoes a ban, while `last_seen` and
//! `last_ip` follow last-writer-wins. The request path creates bindings with
//! `register`, which never replaces an existing record, so a ban written by
//! a racing request survives.

use crate::models::binding::{BindingEntry, DeviceBinding, DeviceIdentity};
use async_trait::async_trait;

pub mod memory;
pub mod postgres;
#[cfg(test)]
pub mod testing;

pub use memory::MemoryBindingStore;
pub use postgres::PgBindingStore;

/// Persistence failure inside a binding store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A persisted row could not be turned back into a binding.
    #[error("corrupt binding record: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait BindingStore: Send + Sync {
    /// Current binding for `api_key`, if any.
    async fn get(&self, api_key: &str) -> Result<Option<DeviceBinding>, StoreError>;

    /// Create or fully overwrite the binding for `api_key`.
    ///
    /// `first_seen` and `last_seen` are set to now, `last_ip` to `client_ip`,
    /// and all ban fields are cleared.
    async fn save(
        &self,
        api_key: &str,
        identity: &DeviceIdentity,
        client_ip: &str,
    ) -> Result<(), StoreError>;

    /// Create the binding for `api_key` unless one already exists.
    ///
    /// Returns `false`, leaving the stored record untouched, when the key is
    /// already bound.
    async fn register(
        &self,
        api_key: &str,
        identity: &DeviceIdentity,
        client_ip: &str,
    ) -> Result<bool, StoreError>;

    /// Record an accepted request. No-op when the key has no binding.
    async fn update_last_seen(&self, api_key: &str, ip: &str) -> Result<(), StoreError>;

    /// Ban the key. Re-banning overwrites the reason and timestamp.
    async fn ban(&self, api_key: &str, reason: &str) -> Result<(), StoreError>;

    /// Clear all ban fields. No-op when the key has no binding.
    async fn unban(&self, api_key: &str) -> Result<(), StoreError>;

    /// Remove the binding, returning whether one existed.
    async fn delete(&self, api_key: &str) -> Result<bool, StoreError>;

    async fn clear(&self) -> Result<(), StoreError>;

    /// Detached snapshot of every binding, keys masked.
    async fn get_all(&self) -> Result<Vec<BindingEntry>, StoreError>;

    /// Short backend name reported by the health check.
    fn backend(&self) -> &'static str {
        "custom"
    }

    /// Backend liveness check.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
