//! Management key authentication.
//!
//! The management API is only mounted when a management key is configured.
//! Callers present it as `X-Management-Key: <key>` or
//! `Authorization: Bearer <key>`. Comparison goes through HMAC tags under a
//! per-process random salt so that it runs in constant time.

use crate::{error::AppError, state::AppState};
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct ManagementKey {
    salt: [u8; 32],
    expected: Vec<u8>,
}

impl ManagementKey {
    /// `None` for a missing or blank key.
    pub fn new(key: Option<&str>) -> Option<Self> {
        let key = key.map(str::trim).filter(|k| !k.is_empty())?;
        let salt: [u8; 32] = rand::random();
        let expected = tag(&salt, key);
        Some(Self { salt, expected })
    }

    pub fn verify(&self, presented: &str) -> bool {
        let mut mac = HmacSha256::new_from_slice(&self.salt).expect("HMAC key length is valid");
        mac.update(presented.as_bytes());
        mac.verify_slice(&self.expected).is_ok()
    }
}

fn tag(salt: &[u8], value: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(salt).expect("HMAC key length is valid");
    mac.update(value.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

fn presented_key(headers: &HeaderMap) -> Option<&str> {
    let explicit = headers
        .get("X-Management-Key")
        .and_then(|h| h.to_str().ok());

    let bearer = || {
        headers
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
    };

    explicit.or_else(bearer).map(str::trim).filter(|k| !k.is_empty())
}

/// Reject management calls without a valid management key.
pub async fn management_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(management) = state.management.as_ref() else {
        return Err(AppError::Unauthorized);
    };

    let authorized = presented_key(request.headers()).is_some_and(|key| management.verify(key));
    if !authorized {
        tracing::warn!(
            method = %request.method(),
            path = %request.uri().path(),
            "management: rejected request with missing or invalid key"
        );
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn blank_key_disables_management() {
        assert!(ManagementKey::new(None).is_none());
        assert!(ManagementKey::new(Some("   ")).is_none());
    }

    #[test]
    fn verify_accepts_only_the_configured_key() {
        let key = ManagementKey::new(Some("admin-secret")).unwrap();
        assert!(key.verify("admin-secret"));
        assert!(!key.verify("admin-secre"));
        assert!(!key.verify(""));
    }

    #[test]
    fn explicit_header_takes_precedence_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-management-key", HeaderValue::from_static("from-header"));
        headers.insert("authorization", HeaderValue::from_static("Bearer from-bearer"));
        assert_eq!(presented_key(&headers), Some("from-header"));

        headers.remove("x-management-key");
        assert_eq!(presented_key(&headers), Some("from-bearer"));
    }
}
