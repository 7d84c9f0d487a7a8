//! Session introspection for authenticated callers.
//!
//! `GET /api/v1/session` sits behind both the API key and the device binding
//! middleware, and reports what the gateway resolved for the caller.

use crate::{
    middleware::{auth::AuthContext, device_binding::DeviceContext},
    models::binding::DeviceKind,
    redact::{mask_key, redacted_device_id},
};
use axum::{Extension, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// Masked API key
    pub api_key: String,
    pub business_name: String,
    pub device_id: String,
    pub device_type: DeviceKind,
    pub client_ip: String,
}

pub async fn current_session(
    Extension(auth): Extension<AuthContext>,
    Extension(device): Extension<DeviceContext>,
) -> Json<SessionResponse> {
    let device_id = redacted_device_id(&device.identity, &auth.api_key).to_string();

    Json(SessionResponse {
        api_key: mask_key(&auth.api_key),
        business_name: auth.business_name,
        device_id,
        device_type: device.identity.kind,
        client_ip: device.client_ip,
    })
}
