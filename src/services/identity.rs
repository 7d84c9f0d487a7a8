//! Device identity extraction.
//!
//! A device is identified by a client-declared header when one is sent,
//! otherwise by the client IP. Both functions here are pure.

use crate::models::binding::{DeviceIdentity, DeviceKind};
use axum::http::{HeaderMap, HeaderName};
use std::net::{IpAddr, SocketAddr};

/// Derive the device identity for a request.
///
/// 1. `header_name` present with a non-blank trimmed value: `(value, client_id)`
/// 2. otherwise: `(client_ip, ip)`
pub fn extract_identity(
    headers: &HeaderMap,
    header_name: &HeaderName,
    client_ip: &str,
) -> DeviceIdentity {
    // Opaque bytes are kept (lossily) rather than dropped
    let raw = headers
        .get(header_name)
        .map(|v| String::from_utf8_lossy(v.as_bytes()));
    let declared = raw.as_deref().map(str::trim).filter(|v| !v.is_empty());

    match declared {
        Some(id) => DeviceIdentity {
            device_id: id.to_string(),
            kind: DeviceKind::ClientId,
        },
        None => DeviceIdentity {
            device_id: client_ip.to_string(),
            kind: DeviceKind::Ip,
        },
    }
}

/// Resolve the client IP of a request.
///
/// With `trust_forwarded` the first valid `X-Forwarded-For` hop wins, then
/// `X-Real-IP`. Otherwise only the socket peer is used. Returns an empty
/// string when nothing is known.
pub fn resolve_client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded: bool,
) -> String {
    if trust_forwarded {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(parse_ip);

        let real_ip = || {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_ip)
        };

        if let Some(ip) = forwarded.or_else(real_ip) {
            return ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string()).unwrap_or_default()
}

fn parse_ip(raw: &str) -> Option<IpAddr> {
    raw.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn device_header() -> HeaderName {
        HeaderName::from_static("x-device-id")
    }

    #[test]
    fn declared_header_wins_and_is_trimmed() {
        let mut headers = HeaderMap::new();
        headers.insert("x-device-id", HeaderValue::from_static("  laptop-7f3a  "));

        let identity = extract_identity(&headers, &device_header(), "203.0.113.7");
        assert_eq!(identity.device_id, "laptop-7f3a");
        assert_eq!(identity.kind, DeviceKind::ClientId);
    }

    #[test]
    fn blank_header_falls_back_to_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-device-id", HeaderValue::from_static("   "));

        let identity = extract_identity(&headers, &device_header(), "203.0.113.7");
        assert_eq!(identity.device_id, "203.0.113.7");
        assert_eq!(identity.kind, DeviceKind::Ip);
    }

    #[test]
    fn non_ascii_header_value_is_still_a_declared_device() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-device-id",
            HeaderValue::from_bytes(b"tablet-\xe9\xff").unwrap(),
        );

        let identity = extract_identity(&headers, &device_header(), "203.0.113.7");
        assert_eq!(identity.kind, DeviceKind::ClientId);
        assert!(identity.device_id.starts_with("tablet-"));
    }

    #[test]
    fn missing_header_and_ip_yields_empty_identity() {
        let identity = extract_identity(&HeaderMap::new(), &device_header(), "");
        assert!(identity.is_empty());
    }

    #[test]
    fn extraction_is_deterministic() {
        let mut headers = HeaderMap::new();
        headers.insert("x-device-id", HeaderValue::from_static("phone"));
        let a = extract_identity(&headers, &device_header(), "10.0.0.1");
        let b = extract_identity(&headers, &device_header(), "10.0.0.1");
        assert_eq!(a, b);
    }

    #[test]
    fn forwarded_headers_ignored_unless_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.1, 10.0.0.1"));
        let peer: SocketAddr = "10.0.0.9:5555".parse().unwrap();

        assert_eq!(resolve_client_ip(&headers, Some(peer), false), "10.0.0.9");
        assert_eq!(resolve_client_ip(&headers, Some(peer), true), "198.51.100.1");
    }

    #[test]
    fn real_ip_used_when_forwarded_for_is_garbage() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("unknown"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));

        assert_eq!(resolve_client_ip(&headers, None, true), "198.51.100.2");
        assert_eq!(resolve_client_ip(&HeaderMap::new(), None, true), "");
    }
}
