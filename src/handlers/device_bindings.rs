//! Device binding management HTTP handlers.
//!
//! This module implements the management endpoints:
//! - GET /v0/management/device-bindings[?api-key=K] - List one or all bindings
//! - DELETE /v0/management/device-bindings[?api-key=K] - Reset one or all bindings
//! - POST /v0/management/device-bindings/unban?api-key=K - Lift a ban
//!
//! Bindings are never created here; only the device guard registers them.
//! API keys are masked in every response and log line.

use crate::{
    error::AppError,
    models::binding::{BindingEntry, DeviceBinding},
    redact::mask_key,
    state::AppState,
};
use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// Query string shared by the management endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct BindingQuery {
    #[serde(rename = "api-key")]
    pub api_key: Option<String>,
}

impl BindingQuery {
    /// Trimmed key, `None` when absent or blank.
    fn key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Serialize)]
pub struct BindingResponse {
    pub api_key: String,
    pub binding: DeviceBinding,
}

#[derive(Debug, Serialize)]
pub struct BindingListResponse {
    pub bindings: Vec<BindingEntry>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// List device bindings.
///
/// # Response
///
/// - **200** with `{"api_key": "sk-l****cdef", "binding": {...}}` when `api-key` is given
/// - **200** with `{"bindings": [{"api_key": ..., "binding": {...}}]}` otherwise
/// - **404** when the given key has no binding
/// - **500** on store failure
pub async fn list_bindings(
    State(state): State<AppState>,
    Query(query): Query<BindingQuery>,
) -> Result<Response, AppError> {
    match query.key() {
        Some(key) => {
            let binding = state.store.get(key).await?.ok_or(AppError::NotFound)?;
            Ok(Json(BindingResponse {
                api_key: mask_key(key),
                binding,
            })
            .into_response())
        }
        None => {
            let bindings = state.store.get_all().await?;
            Ok(Json(BindingListResponse { bindings }).into_response())
        }
    }
}

/// Reset device bindings.
///
/// With `api-key`, removes that key's binding so the next request registers
/// a fresh device. Without it, removes every binding.
///
/// # Response
///
/// - **200** with a confirmation message
/// - **404** when the given key has no binding
/// - **500** on store failure
pub async fn reset_bindings(
    State(state): State<AppState>,
    Query(query): Query<BindingQuery>,
) -> Result<Json<MessageResponse>, AppError> {
    match query.key() {
        Some(key) => {
            let masked = mask_key(key);
            let deleted = state.store.delete(key).await.map_err(|e| {
                tracing::error!(key = %masked, error = %e, "device-binding: failed to delete binding");
                AppError::from(e)
            })?;

            if !deleted {
                return Err(AppError::NotFound);
            }

            tracing::info!(key = %masked, "device-binding: reset device by admin");
            Ok(Json(MessageResponse {
                message: "Device binding reset successfully".to_string(),
                api_key: Some(masked),
            }))
        }
        None => {
            state.store.clear().await.map_err(|e| {
                tracing::error!(error = %e, "device-binding: failed to clear all bindings");
                AppError::from(e)
            })?;

            tracing::info!("device-binding: all device bindings cleared by admin");
            Ok(Json(MessageResponse {
                message: "All device bindings cleared successfully".to_string(),
                api_key: None,
            }))
        }
    }
}

/// Lift the ban on an API key.
///
/// # Response
///
/// - **200** when the ban was cleared
/// - **400** `missing_parameter` without `api-key`
/// - **404** `not_found` when the key has no binding
/// - **400** `not_banned` when the key is not banned
/// - **500** on store failure
pub async fn unban_key(
    State(state): State<AppState>,
    Query(query): Query<BindingQuery>,
) -> Result<Json<MessageResponse>, AppError> {
    let key = query.key().ok_or(AppError::MissingParameter("api-key"))?;
    let masked = mask_key(key);

    let binding = state.store.get(key).await?.ok_or(AppError::NotFound)?;
    if !binding.banned {
        return Err(AppError::NotBanned);
    }

    state.store.unban(key).await.map_err(|e| {
        tracing::error!(key = %masked, error = %e, "device-binding: failed to unban key");
        AppError::from(e)
    })?;

    tracing::info!(key = %masked, "device-binding: unbanned key by admin");
    Ok(Json(MessageResponse {
        message: "API key unbanned successfully".to_string(),
        api_key: Some(masked),
    }))
}
