//! API key records used by upstream authentication.
//!
//! Keys are never stored in clear text. The database keeps the SHA-256 hex
//! digest, and statically configured keys are hashed once at startup.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Row of the `api_keys` table.
///
/// Rows are looked up by `key_hash`, the SHA-256 hex digest of the key.
/// Only active keys are loaded; revoked keys are filtered out in SQL.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKeyRecord {
    pub id: Uuid,

    /// Human-readable owner of the key
    pub business_name: String,
}

/// Hash an API key the same way it is stored.
pub fn hash_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_hex_sha256() {
        let digest = hash_key("sk-live-abc");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hash_key("sk-live-abc"));
        assert_ne!(digest, hash_key("sk-live-abd"));
    }
}
