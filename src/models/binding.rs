//! Device binding models.
//!
//! This module defines:
//! - `DeviceBinding`: the record tying an API key to one device
//! - `DeviceKind`: how the device was identified (declared header or client IP)
//! - `DeviceIdentity`: the identity extracted from a single request
//! - `BindingEntry`: one row of an administrative snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a device identifies itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Identified by the client IP address (no device header sent)
    Ip,

    /// Identified by a client-declared device header
    ClientId,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Ip => "ip",
            DeviceKind::ClientId => "client_id",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ip" => Ok(DeviceKind::Ip),
            "client_id" => Ok(DeviceKind::ClientId),
            other => Err(format!("unknown device type: {other}")),
        }
    }
}

/// Device identity derived from one inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub device_id: String,
    pub kind: DeviceKind,
}

impl DeviceIdentity {
    pub fn is_empty(&self) -> bool {
        self.device_id.is_empty()
    }
}

/// Binding between an API key and the device that first used it.
///
/// # Invariants
///
/// - `banned` is true exactly when `ban_reason` is non-empty and `banned_at` is set
/// - `first_seen` never changes after the binding is created
/// - `last_ip` is the client IP of the most recently accepted request
///
/// # JSON Example
///
/// ```json
/// {
///   "device_id": "laptop-7f3a",
///   "type": "client_id",
///   "first_seen": "2025-12-20T10:00:00Z",
///   "last_seen": "2025-12-20T10:05:00Z",
///   "last_ip": "203.0.113.7",
///   "banned": false,
///   "ban_reason": "",
///   "banned_at": null
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceBinding {
    /// Declared device ID or client IP, depending on `kind`
    pub device_id: String,

    /// How the device was identified at registration
    #[serde(rename = "type")]
    pub kind: DeviceKind,

    /// When the binding was created
    pub first_seen: DateTime<Utc>,

    /// When the last accepted request arrived
    pub last_seen: DateTime<Utc>,

    /// Client IP of the last accepted request (empty if never recorded)
    pub last_ip: String,

    pub banned: bool,

    pub ban_reason: String,

    pub banned_at: Option<DateTime<Utc>>,
}

impl DeviceBinding {
    /// Fresh, unbanned binding registered at `now`.
    pub fn register(identity: &DeviceIdentity, client_ip: &str, now: DateTime<Utc>) -> Self {
        Self {
            device_id: identity.device_id.clone(),
            kind: identity.kind,
            first_seen: now,
            last_seen: now,
            last_ip: client_ip.to_string(),
            banned: false,
            ban_reason: String::new(),
            banned_at: None,
        }
    }

    pub fn touch(&mut self, ip: &str, now: DateTime<Utc>) {
        self.last_seen = now;
        self.last_ip = ip.to_string();
    }

    pub fn ban(&mut self, reason: &str, now: DateTime<Utc>) {
        self.banned = true;
        self.ban_reason = reason.to_string();
        self.banned_at = Some(now);
    }

    pub fn unban(&mut self) {
        self.banned = false;
        self.ban_reason.clear();
        self.banned_at = None;
    }
}

/// One row of a binding snapshot, with the API key already masked.
#[derive(Debug, Clone, Serialize)]
pub struct BindingEntry {
    pub api_key: String,
    pub binding: DeviceBinding,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn identity() -> DeviceIdentity {
        DeviceIdentity {
            device_id: "laptop-7f3a".to_string(),
            kind: DeviceKind::ClientId,
        }
    }

    #[test]
    fn register_records_client_ip_and_no_ban() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let binding = DeviceBinding::register(&identity(), "203.0.113.7", now);

        assert_eq!(binding.first_seen, binding.last_seen);
        assert_eq!(binding.last_ip, "203.0.113.7");
        assert!(!binding.banned);
        assert!(binding.ban_reason.is_empty());
        assert!(binding.banned_at.is_none());
    }

    #[test]
    fn ban_then_unban_clears_all_ban_fields() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut binding = DeviceBinding::register(&identity(), "203.0.113.7", now);

        binding.ban("shared key", now);
        assert!(binding.banned);
        assert_eq!(binding.ban_reason, "shared key");
        assert_eq!(binding.banned_at, Some(now));

        binding.unban();
        assert!(!binding.banned);
        assert!(binding.ban_reason.is_empty());
        assert!(binding.banned_at.is_none());
        assert_eq!(binding.first_seen, now);
    }

    #[test]
    fn serializes_kind_as_type_field() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let binding = DeviceBinding::register(&identity(), "203.0.113.7", now);
        let value = serde_json::to_value(&binding).unwrap();

        assert_eq!(value["type"], "client_id");
        assert_eq!(value["banned_at"], serde_json::Value::Null);
        assert_eq!("ip".parse::<DeviceKind>().unwrap(), DeviceKind::Ip);
        assert!("mac".parse::<DeviceKind>().is_err());
    }
}
