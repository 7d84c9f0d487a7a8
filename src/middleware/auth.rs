//! API key authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the API key from the Authorization header
//! 2. Hash it and look it up in the key directory
//! 3. Inject authentication context into the request
//! 4. Reject unauthorized requests with HTTP 401

use crate::{
    db::DbPool,
    error::AppError,
    models::api_key::{ApiKeyRecord, hash_key},
    redact::mask_key,
    state::AppState,
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Authentication context attached to authenticated requests.
///
/// Carries the validated API key so that the device binding guard can key
/// its bindings by it. `Debug` output masks the key.
#[derive(Clone)]
pub struct AuthContext {
    /// The validated API key
    pub api_key: String,

    /// Database ID of the key, when keys come from the database
    pub api_key_id: Option<Uuid>,

    /// Name of the business the key belongs to
    pub business_name: String,
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("api_key", &mask_key(&self.api_key))
            .field("api_key_id", &self.api_key_id)
            .field("business_name", &self.business_name)
            .finish()
    }
}

/// Where valid API keys come from.
#[derive(Clone)]
pub enum KeyDirectory {
    /// Active rows of the `api_keys` table
    Database(DbPool),

    /// Keys from configuration, indexed by SHA-256 digest
    Static(Arc<HashMap<String, String>>),
}

impl KeyDirectory {
    /// Build a static directory from raw configured keys.
    ///
    /// Blank entries are skipped. Each key is labelled with its masked form.
    pub fn from_keys(keys: &[String]) -> Self {
        let index = keys
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(|k| (hash_key(k), mask_key(k)))
            .collect();

        KeyDirectory::Static(Arc::new(index))
    }

    /// Resolve a presented key into an auth context, `None` if unknown.
    pub async fn resolve(&self, api_key: &str) -> Result<Option<AuthContext>, AppError> {
        let key_hash = hash_key(api_key);

        match self {
            KeyDirectory::Database(pool) => {
                let record = sqlx::query_as::<_, ApiKeyRecord>(
                    "SELECT id, business_name
                     FROM api_keys
                     WHERE key_hash = $1 AND is_active = true",
                )
                .bind(&key_hash)
                .fetch_optional(pool)
                .await
                .map_err(crate::store::StoreError::from)?;

                Ok(record.map(|r| AuthContext {
                    api_key: api_key.to_string(),
                    api_key_id: Some(r.id),
                    business_name: r.business_name,
                }))
            }
            KeyDirectory::Static(index) => Ok(index.get(&key_hash).map(|label| AuthContext {
                api_key: api_key.to_string(),
                api_key_id: None,
                business_name: label.clone(),
            })),
        }
    }
}

/// API key authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <key>` header from request
/// 2. Resolve the key against the configured directory
/// 3. If found: inject `AuthContext` into request, call next handler
/// 4. If not found: return 401 Unauthorized error
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let api_key = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or(AppError::InvalidApiKey)?
        .to_string();

    let Some(auth_context) = state.keys.resolve(&api_key).await? else {
        tracing::debug!(key = %mask_key(&api_key), "rejected unknown API key");
        return Err(AppError::InvalidApiKey);
    };

    // Route handlers and the device guard read this via Extension<AuthContext>
    request.extensions_mut().insert(auth_context);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_directory_resolves_configured_keys_only() {
        let directory = KeyDirectory::from_keys(&[
            "sk-live-0123456789abcdef".to_string(),
            "   ".to_string(),
        ]);

        let context = directory
            .resolve("sk-live-0123456789abcdef")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(context.api_key, "sk-live-0123456789abcdef");
        assert_eq!(context.business_name, "sk-l****cdef");
        assert!(context.api_key_id.is_none());

        assert!(directory.resolve("sk-live-other").await.unwrap().is_none());
        assert!(directory.resolve("").await.unwrap().is_none());
    }

    #[test]
    fn debug_output_masks_key() {
        let context = AuthContext {
            api_key: "sk-live-0123456789abcdef".to_string(),
            api_key_id: None,
            business_name: "acme".to_string(),
        };
        let rendered = format!("{context:?}");
        assert!(!rendered.contains("0123456789"));
        assert!(rendered.contains("sk-l****cdef"));
    }
}
