//! Masking of secrets before they reach logs or responses.

use crate::models::binding::DeviceIdentity;
use axum::http::HeaderMap;

/// Keys shorter than this are fully hidden.
const MIN_PARTIAL_LEN: usize = 12;

/// Characters revealed at each end of a long key.
const REVEALED: usize = 4;

const MASKED_VALUE: &str = "***masked***";

/// Headers whose values are always credentials.
const SENSITIVE_HEADERS: [&str; 4] = [
    "authorization",
    "proxy-authorization",
    "x-api-key",
    "x-management-key",
];

/// Mask an API key for display.
///
/// At most the first and last four characters survive:
/// `sk-live-0123456789` becomes `sk-l****6789`. Short keys become `****`.
pub fn mask_key(api_key: &str) -> String {
    let chars: Vec<char> = api_key.chars().collect();
    if chars.len() < MIN_PARTIAL_LEN {
        return "****".to_string();
    }

    let head: String = chars[..REVEALED].iter().collect();
    let tail: String = chars[chars.len() - REVEALED..].iter().collect();
    format!("{head}****{tail}")
}

/// Render request headers for debug logging with credentials removed.
///
/// A header is redacted when its name is a known credential header or when
/// its value contains the API key in any form.
pub fn redact_headers(headers: &HeaderMap, api_key: &str) -> String {
    headers
        .iter()
        .map(|(name, value)| {
            let rendered = match value.to_str() {
                Ok(v) if is_sensitive(name.as_str(), v, api_key) => MASKED_VALUE,
                Ok(v) => v,
                Err(_) => "<binary>",
            };
            format!("{}={}", name.as_str(), rendered)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Device ID safe to log, store or return.
///
/// A declared device ID that carries the API key is replaced wholesale.
pub fn redacted_device_id<'a>(identity: &'a DeviceIdentity, api_key: &str) -> &'a str {
    if !api_key.is_empty() && identity.device_id.contains(api_key) {
        MASKED_VALUE
    } else {
        &identity.device_id
    }
}

fn is_sensitive(name: &str, value: &str, api_key: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|h| name.eq_ignore_ascii_case(h))
        || (!api_key.is_empty() && value.contains(api_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::binding::DeviceKind;
    use axum::http::HeaderValue;

    #[test]
    fn long_keys_keep_only_four_chars_each_side() {
        let masked = mask_key("sk-live-0123456789abcdef");
        assert_eq!(masked, "sk-l****cdef");
    }

    #[test]
    fn short_keys_are_fully_hidden() {
        assert_eq!(mask_key(""), "****");
        assert_eq!(mask_key("k1"), "****");
        assert_eq!(mask_key("elevenchars"), "****");
    }

    #[test]
    fn masking_never_reveals_more_than_eight_chars() {
        for len in 0..64 {
            let key: String = "abcdefghijklmnopqrstuvwxyz0123456789"
                .chars()
                .cycle()
                .take(len)
                .collect();
            let masked = mask_key(&key);
            let revealed = masked.chars().filter(|c| *c != '*').count();
            assert!(revealed <= 2 * REVEALED, "len {len} revealed {revealed}");
        }
    }

    #[test]
    fn multibyte_keys_do_not_panic() {
        let masked = mask_key("ключ-секретный-ключ");
        assert!(masked.starts_with("ключ"));
    }

    #[test]
    fn credential_headers_are_redacted() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer sk-secret-key-1"));
        headers.insert("x-custom-token", HeaderValue::from_static("sk-secret-key-1"));
        headers.insert("x-device-id", HeaderValue::from_static("laptop"));

        let rendered = redact_headers(&headers, "sk-secret-key-1");
        assert!(!rendered.contains("sk-secret-key-1"));
        assert!(rendered.contains("authorization=***masked***"));
        assert!(rendered.contains("x-custom-token=***masked***"));
        assert!(rendered.contains("x-device-id=laptop"));
    }

    #[test]
    fn device_id_carrying_the_key_is_masked() {
        let key = "sk-secret-key-1";
        let leaked = DeviceIdentity {
            device_id: format!("dev-{key}"),
            kind: DeviceKind::ClientId,
        };
        let plain = DeviceIdentity {
            device_id: "laptop".to_string(),
            kind: DeviceKind::ClientId,
        };

        assert_eq!(redacted_device_id(&leaked, key), MASKED_VALUE);
        assert_eq!(redacted_device_id(&plain, key), "laptop");
        assert_eq!(redacted_device_id(&plain, ""), "laptop");
    }
}
