//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use crate::store::StoreError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Authentication Errors**: invalid API key or management credential
/// - **Guard Rejections**: banned key, concurrent usage detected
/// - **Management Errors**: missing parameter, unknown binding, key not banned
/// - **Store Errors**: persistence failures surfaced by management calls
///
/// Messages never contain an API key; a ban reason may be disclosed.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Persistence failed while serving a management call.
    ///
    /// Returns HTTP 500; details are only logged.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// API key is missing, invalid, or inactive.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Management credential missing or wrong.
    #[error("Invalid management key")]
    Unauthorized,

    /// No device binding exists for the requested key.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("No device binding found for this API key")]
    NotFound,

    /// Unban requested for a key that is not banned.
    #[error("This API key is not banned")]
    NotBanned,

    /// Required query parameter absent or blank.
    ///
    /// The String names the parameter.
    #[error("{0} parameter is required")]
    MissingParameter(&'static str),

    /// The key is banned until an administrator unbans it.
    ///
    /// Returns HTTP 403 with the ban reason.
    #[error("This API key has been banned: {0}")]
    ApiKeyBanned(String),

    /// The key was just banned for use from two IPs inside the window.
    #[error("Suspicious concurrent usage detected. API key has been banned. Contact admin to unban.")]
    ConcurrentUsageDetected,
}

impl AppError {
    /// Machine-readable error code carried in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Store(_) => "internal_error",
            AppError::InvalidApiKey => "invalid_api_key",
            AppError::Unauthorized => "unauthorized",
            AppError::NotFound => "not_found",
            AppError::NotBanned => "not_banned",
            AppError::MissingParameter(_) => "missing_parameter",
            AppError::ApiKeyBanned(_) => "api_key_banned",
            AppError::ConcurrentUsageDetected => "concurrent_usage_detected",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidApiKey | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::NotBanned | AppError::MissingParameter(_) => StatusCode::BAD_REQUEST,
            AppError::ApiKeyBanned(_) | AppError::ConcurrentUsageDetected => StatusCode::FORBIDDEN,
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": "api_key_banned",
///   "message": "This API key has been banned: Concurrent usage detected: different IP within 10s"
/// }
/// ```
///
/// Store errors are logged here and answered with a generic message.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match self {
            AppError::Store(ref e) => {
                tracing::error!(error = %e, "store failure while serving request");
                "An internal error occurred".to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": self.code(),
            "message": message
        }));

        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_are_forbidden_with_codes() {
        let banned = AppError::ApiKeyBanned("shared".to_string());
        assert_eq!(banned.status(), StatusCode::FORBIDDEN);
        assert_eq!(banned.code(), "api_key_banned");
        assert!(banned.to_string().contains("shared"));

        let concurrent = AppError::ConcurrentUsageDetected;
        assert_eq!(concurrent.status(), StatusCode::FORBIDDEN);
        assert_eq!(concurrent.code(), "concurrent_usage_detected");
    }

    #[test]
    fn management_errors_map_to_client_statuses() {
        assert_eq!(AppError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::NotBanned.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::MissingParameter("api-key").to_string(),
            "api-key parameter is required"
        );
        let store = AppError::from(StoreError::Corrupt("bad".to_string()));
        assert_eq!(store.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(store.code(), "internal_error");
    }
}
