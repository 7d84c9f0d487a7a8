//! In-process binding store.
//!
//! Bindings live in a `HashMap` behind a single `parking_lot::RwLock`.
//! Reads share the lock; every mutation takes the write guard exactly once,
//! so no operation ever observes a half-applied change. Bindings are
//! per-instance: horizontally replicated gateways need `PgBindingStore`.

use super::{BindingStore, StoreError};
use crate::clock::Clock;
use crate::models::binding::{BindingEntry, DeviceBinding, DeviceIdentity};
use crate::redact::mask_key;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

pub struct MemoryBindingStore {
    bindings: RwLock<HashMap<String, DeviceBinding>>,
    clock: Arc<dyn Clock>,
}

impl MemoryBindingStore {
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            bindings: RwLock::new(HashMap::new()),
            clock,
        }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.bindings.read().is_empty()
    }
}

#[async_trait]
impl BindingStore for MemoryBindingStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, api_key: &str) -> Result<Option<DeviceBinding>, StoreError> {
        Ok(self.bindings.read().get(api_key).cloned())
    }

    async fn save(
        &self,
        api_key: &str,
        identity: &DeviceIdentity,
        client_ip: &str,
    ) -> Result<(), StoreError> {
        let binding = DeviceBinding::register(identity, client_ip, self.clock.now());
        self.bindings.write().insert(api_key.to_string(), binding);
        Ok(())
    }

    async fn register(
        &self,
        api_key: &str,
        identity: &DeviceIdentity,
        client_ip: &str,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now();
        match self.bindings.write().entry(api_key.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(DeviceBinding::register(identity, client_ip, now));
                Ok(true)
            }
        }
    }

    async fn update_last_seen(&self, api_key: &str, ip: &str) -> Result<(), StoreError> {
        let now = self.clock.now();
        if let Some(binding) = self.bindings.write().get_mut(api_key) {
            binding.touch(ip, now);
        }
        Ok(())
    }

    async fn ban(&self, api_key: &str, reason: &str) -> Result<(), StoreError> {
        let now = self.clock.now();
        if let Some(binding) = self.bindings.write().get_mut(api_key) {
            binding.ban(reason, now);
        }
        Ok(())
    }

    async fn unban(&self, api_key: &str) -> Result<(), StoreError> {
        if let Some(binding) = self.bindings.write().get_mut(api_key) {
            binding.unban();
        }
        Ok(())
    }

    async fn delete(&self, api_key: &str) -> Result<bool, StoreError> {
        Ok(self.bindings.write().remove(api_key).is_some())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.bindings.write().clear();
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<BindingEntry>, StoreError> {
        let guard = self.bindings.read();
        let mut entries: Vec<BindingEntry> = guard
            .iter()
            .map(|(key, binding)| BindingEntry {
                api_key: mask_key(key),
                binding: binding.clone(),
            })
            .collect();
        drop(guard);

        entries.sort_by(|a, b| a.binding.first_seen.cmp(&b.binding.first_seen));
        Ok(entries)
    }
}
