//! Shared application state handed to every handler and middleware.

use crate::clock::Clock;
use crate::config::Config;
use crate::middleware::auth::KeyDirectory;
use crate::middleware::management::ManagementKey;
use crate::services::decision::DeviceGuard;
use crate::store::BindingStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Binding store shared by the guard and the management API
    pub store: Arc<dyn BindingStore>,
    pub guard: Arc<DeviceGuard>,
    pub keys: KeyDirectory,
    /// `None` leaves the management API unmounted
    pub management: Option<ManagementKey>,
    pub trust_forwarded_headers: bool,
}

impl AppState {
    pub fn new(
        store: Arc<dyn BindingStore>,
        keys: KeyDirectory,
        config: &Config,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let guard = DeviceGuard::new(store.clone(), config.device_binding(), clock);

        Self {
            store,
            guard: Arc::new(guard),
            keys,
            management: ManagementKey::new(config.management_key.as_deref()),
            trust_forwarded_headers: config.trust_forwarded_headers,
        }
    }
}
