//! Application configuration management.
//!
//! Configuration comes from environment variables (optionally seeded from a
//! `.env` file) and is deserialized with `envy`.

use axum::http::HeaderName;
use serde::Deserialize;
use std::time::Duration;

/// Default header carrying a client-declared device ID.
pub const DEFAULT_DEVICE_HEADER: &str = "X-Device-ID";

/// Default window for concurrent-usage detection.
pub const DEFAULT_CONCURRENT_THRESHOLD: Duration = Duration::from_secs(60);

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (optional): PostgreSQL connection string; without it bindings are kept in memory
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `API_KEYS` (optional): comma-separated API keys accepted when no database is configured
/// - `MANAGEMENT_KEY` (optional): enables the management API when set
/// - `TRUST_FORWARDED_HEADERS` (optional): take the client IP from `X-Forwarded-For` / `X-Real-IP`
/// - `DEVICE_BINDING_ENABLED`, `DEVICE_BINDING_MAX_DEVICES`, `DEVICE_BINDING_HEADER_NAME`,
///   `DEVICE_BINDING_CONCURRENT_THRESHOLD_SECS`: see [`DeviceBindingConfig`]
#[derive(Clone, Deserialize)]
pub struct Config {
    pub database_url: Option<String>,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default)]
    pub api_keys: Vec<String>,

    pub management_key: Option<String>,

    #[serde(default)]
    pub trust_forwarded_headers: bool,

    #[serde(default)]
    pub device_binding_enabled: bool,

    #[serde(default = "default_max_devices")]
    pub device_binding_max_devices: i64,

    #[serde(default = "default_header_name")]
    pub device_binding_header_name: String,

    #[serde(default = "default_threshold_secs")]
    pub device_binding_concurrent_threshold_secs: u64,
}

fn default_port() -> u16 {
    3000
}

fn default_max_devices() -> i64 {
    1
}

fn default_header_name() -> String {
    DEFAULT_DEVICE_HEADER.to_string()
}

fn default_threshold_secs() -> u64 {
    DEFAULT_CONCURRENT_THRESHOLD.as_secs()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed into its expected type.
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        envy::from_env::<Config>()
    }

    /// Device binding settings with defaults applied.
    pub fn device_binding(&self) -> DeviceBindingConfig {
        DeviceBindingConfig::new(
            self.device_binding_enabled,
            self.device_binding_max_devices,
            &self.device_binding_header_name,
            Duration::from_secs(self.device_binding_concurrent_threshold_secs),
        )
    }
}

// Secrets stay out of debug output
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database", &self.database_url.as_ref().map(|_| "<set>"))
            .field("server_port", &self.server_port)
            .field("api_keys", &self.api_keys.len())
            .field("management_key", &self.management_key.as_ref().map(|_| "<set>"))
            .field("trust_forwarded_headers", &self.trust_forwarded_headers)
            .field("device_binding", &self.device_binding())
            .finish()
    }
}

/// Device binding guard settings.
///
/// - `enabled`: guard switch, off by default
/// - `max_devices`: devices allowed per key; only single-device tracking is
///   implemented, larger values are accepted but not enforced
/// - `header_name`: header carrying a client-declared device ID
/// - `concurrent_threshold`: a different IP seen within this window after the
///   last accepted request counts as concurrent usage
#[derive(Debug, Clone)]
pub struct DeviceBindingConfig {
    pub enabled: bool,
    pub max_devices: u32,
    pub header_name: HeaderName,
    pub concurrent_threshold: Duration,
}

impl DeviceBindingConfig {
    /// Build a config, replacing out-of-range values with defaults.
    pub fn new(enabled: bool, max_devices: i64, header_name: &str, threshold: Duration) -> Self {
        let max_devices = u32::try_from(max_devices)
            .ok()
            .filter(|n| *n > 0)
            .unwrap_or(1);

        let header_name = HeaderName::try_from(header_name.trim()).unwrap_or_else(|_| {
            if !header_name.trim().is_empty() {
                tracing::warn!(
                    header = header_name,
                    "device-binding: invalid header name, falling back to {DEFAULT_DEVICE_HEADER}"
                );
            }
            HeaderName::from_static("x-device-id")
        });

        let concurrent_threshold = if threshold.is_zero() {
            DEFAULT_CONCURRENT_THRESHOLD
        } else {
            threshold
        };

        Self {
            enabled,
            max_devices,
            header_name,
            concurrent_threshold,
        }
    }
}

impl Default for DeviceBindingConfig {
    fn default() -> Self {
        Self::new(false, 1, DEFAULT_DEVICE_HEADER, DEFAULT_CONCURRENT_THRESHOLD)
    }
}
