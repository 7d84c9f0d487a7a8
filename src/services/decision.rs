//! Device binding decisions.
//!
//! The decision is split in two:
//! - `evaluate`: a pure function of `(now, binding, current IP, threshold)`
//! - `DeviceGuard::check`: applies the verdict to the store and logs it
//!
//! # State Machine
//!
//! ```text
//! no binding ──register──▶ bound ──touch──▶ bound
//!                            │
//!                            │ other IP within threshold
//!                            ▼
//!                          banned ──admin unban──▶ bound
//! ```
//!
//! Store failures on this path are logged and the request is allowed
//! (fail-open), except that a failed ban still rejects the current request.

use crate::clock::Clock;
use crate::config::DeviceBindingConfig;
use crate::error::AppError;
use crate::models::binding::{DeviceBinding, DeviceIdentity};
use crate::redact::{mask_key, redacted_device_id};
use crate::store::BindingStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// What the pure decision asks the guard to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// No binding yet: register the device and allow.
    Register,

    /// Binding is banned: reject without mutation.
    RejectBanned { reason: String },

    /// Different IP inside the window: ban the key and reject.
    BanConcurrent { reason: String, elapsed: Duration },

    /// Accept and record the request.
    Touch,
}

/// Terminal outcome of one guarded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Allowed,
    Registered,
    RejectedBanned { reason: String },
    RejectedConcurrent { reason: String },
}

impl Outcome {
    /// Map rejections onto their HTTP errors.
    pub fn into_result(self) -> Result<(), AppError> {
        match self {
            Outcome::Allowed | Outcome::Registered => Ok(()),
            Outcome::RejectedBanned { reason } => Err(AppError::ApiKeyBanned(reason)),
            Outcome::RejectedConcurrent { .. } => Err(AppError::ConcurrentUsageDetected),
        }
    }
}

/// Time since `last_seen`, clamped at zero when `last_seen` lies ahead of `now`.
pub fn elapsed_since(last_seen: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - last_seen).to_std().unwrap_or(Duration::ZERO)
}

pub fn concurrent_ban_reason(elapsed: Duration) -> String {
    format!("Concurrent usage detected: different IP within {elapsed:?}")
}

/// Decide what to do with a request for a key whose binding is `binding`.
///
/// A request from the last accepted IP, or against a binding that never
/// recorded an IP, is always accepted regardless of elapsed time.
pub fn evaluate(
    now: DateTime<Utc>,
    binding: Option<&DeviceBinding>,
    current_ip: &str,
    threshold: Duration,
) -> Verdict {
    let Some(binding) = binding else {
        return Verdict::Register;
    };

    if binding.banned {
        return Verdict::RejectBanned {
            reason: binding.ban_reason.clone(),
        };
    }

    let elapsed = elapsed_since(binding.last_seen, now);
    if !binding.last_ip.is_empty() && binding.last_ip != current_ip && elapsed < threshold {
        return Verdict::BanConcurrent {
            reason: concurrent_ban_reason(elapsed),
            elapsed,
        };
    }

    Verdict::Touch
}

/// Request-path guard binding API keys to devices.
pub struct DeviceGuard {
    store: Arc<dyn BindingStore>,
    config: DeviceBindingConfig,
    clock: Arc<dyn Clock>,
}

impl DeviceGuard {
    pub fn new(
        store: Arc<dyn BindingStore>,
        config: DeviceBindingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        if config.enabled && config.max_devices > 1 {
            tracing::warn!(
                max_devices = config.max_devices,
                "device-binding: only one device per key is tracked, max_devices is not enforced"
            );
        }

        Self {
            store,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &DeviceBindingConfig {
        &self.config
    }

    /// Run the binding state machine for one request.
    ///
    /// `api_key` is the key already validated upstream; `None` means the
    /// request carries no key and is left to authentication to reject.
    pub async fn check(
        &self,
        api_key: Option<&str>,
        identity: &DeviceIdentity,
        current_ip: &str,
    ) -> Outcome {
        if !self.config.enabled {
            return Outcome::Allowed;
        }

        let Some(api_key) = api_key.filter(|k| !k.is_empty()) else {
            return Outcome::Allowed;
        };
        let masked = mask_key(api_key);

        if identity.is_empty() {
            tracing::warn!(key = %masked, "device-binding: could not extract device ID");
            return Outcome::Allowed;
        }

        let mut binding = match self.store.get(api_key).await {
            Ok(binding) => binding,
            Err(e) => {
                tracing::error!(key = %masked, error = %e, "device-binding: lookup failed, allowing request");
                return Outcome::Allowed;
            }
        };

        let now = self.clock.now();
        let threshold = self.config.concurrent_threshold;
        let mut verdict = evaluate(now, binding.as_ref(), current_ip, threshold);

        if verdict == Verdict::Register {
            if let Some(outcome) = self.register(api_key, &masked, identity, current_ip).await {
                return outcome;
            }

            // Another request bound the key after our lookup; decide against its record
            binding = match self.store.get(api_key).await {
                Ok(binding) => binding,
                Err(e) => {
                    tracing::error!(key = %masked, error = %e, "device-binding: lookup failed, allowing request");
                    return Outcome::Allowed;
                }
            };
            verdict = evaluate(now, binding.as_ref(), current_ip, threshold);
        }

        match verdict {
            // Registered and deleted again in between; the next request registers
            Verdict::Register => Outcome::Allowed,
            Verdict::RejectBanned { reason } => {
                tracing::warn!(key = %masked, reason = %reason, "device-binding: rejected banned key");
                Outcome::RejectedBanned { reason }
            }
            Verdict::BanConcurrent { reason, elapsed } => {
                let last_ip = binding.as_ref().map(|b| b.last_ip.as_str()).unwrap_or_default();
                tracing::warn!(
                    key = %masked,
                    last_ip,
                    current_ip,
                    elapsed = ?elapsed,
                    "device-binding: banned key for concurrent usage"
                );

                // The request is rejected either way; a failed ban leaves the key usable later
                if let Err(e) = self.store.ban(api_key, &reason).await {
                    tracing::error!(key = %masked, error = %e, "device-binding: failed to ban key");
                }
                Outcome::RejectedConcurrent { reason }
            }
            Verdict::Touch => {
                if let Err(e) = self.store.update_last_seen(api_key, current_ip).await {
                    tracing::warn!(key = %masked, error = %e, "device-binding: failed to update last_seen");
                }
                Outcome::Allowed
            }
        }
    }

    /// Bind the key to this device. `None` when another request bound it first.
    ///
    /// A declared device ID carrying the API key is stored masked.
    async fn register(
        &self,
        api_key: &str,
        masked: &str,
        identity: &DeviceIdentity,
        current_ip: &str,
    ) -> Option<Outcome> {
        let device = DeviceIdentity {
            device_id: redacted_device_id(identity, api_key).to_string(),
            kind: identity.kind,
        };

        match self.store.register(api_key, &device, current_ip).await {
            Ok(true) => {
                tracing::info!(
                    key = %masked,
                    device_id = %device.device_id,
                    device_type = %device.kind,
                    client_ip = current_ip,
                    "device-binding: new device registered"
                );
                Some(Outcome::Registered)
            }
            Ok(false) => {
                tracing::debug!(key = %masked, "device-binding: key registered concurrently, re-evaluating");
                None
            }
            Err(e) => {
                tracing::error!(key = %masked, error = %e, "device-binding: failed to save binding");
                Some(Outcome::Registered)
            }
        }
    }
}
