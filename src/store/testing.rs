//! Store doubles shared by unit and router tests.

use super::{BindingStore, StoreError};
use crate::models::binding::{BindingEntry, DeviceBinding, DeviceIdentity};
use async_trait::async_trait;

fn down() -> StoreError {
    StoreError::Corrupt("down".to_string())
}

/// Store whose every operation fails.
pub struct FailingStore;

#[async_trait]
impl BindingStore for FailingStore {
    async fn get(&self, _: &str) -> Result<Option<DeviceBinding>, StoreError> {
        Err(down())
    }
    async fn save(&self, _: &str, _: &DeviceIdentity, _: &str) -> Result<(), StoreError> {
        Err(down())
    }
    async fn register(&self, _: &str, _: &DeviceIdentity, _: &str) -> Result<bool, StoreError> {
        Err(down())
    }
    async fn update_last_seen(&self, _: &str, _: &str) -> Result<(), StoreError> {
        Err(down())
    }
    async fn ban(&self, _: &str, _: &str) -> Result<(), StoreError> {
        Err(down())
    }
    async fn unban(&self, _: &str) -> Result<(), StoreError> {
        Err(down())
    }
    async fn delete(&self, _: &str) -> Result<bool, StoreError> {
        Err(down())
    }
    async fn clear(&self) -> Result<(), StoreError> {
        Err(down())
    }
    async fn get_all(&self) -> Result<Vec<BindingEntry>, StoreError> {
        Err(down())
    }
    async fn ping(&self) -> Result<(), StoreError> {
        Err(down())
    }
}
