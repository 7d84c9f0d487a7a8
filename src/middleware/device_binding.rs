//! Device binding guard middleware.
//!
//! Runs after API key authentication. Resolves the client IP and device
//! identity, runs the guard, and either rejects with 403 or forwards the
//! request with a `DeviceContext` extension attached.

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::binding::DeviceIdentity,
    redact::{mask_key, redact_headers, redacted_device_id},
    services::identity::{extract_identity, resolve_client_ip},
    state::AppState,
};
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;

/// Device information resolved for the current request.
#[derive(Debug, Clone)]
pub struct DeviceContext {
    pub client_ip: String,
    pub identity: DeviceIdentity,
}

pub async fn device_binding_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let guard = &state.guard;

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let client_ip = resolve_client_ip(request.headers(), peer, state.trust_forwarded_headers);
    let identity = extract_identity(request.headers(), &guard.config().header_name, &client_ip);

    let api_key = request
        .extensions()
        .get::<AuthContext>()
        .map(|auth| auth.api_key.clone());

    if guard.config().enabled {
        if let Some(key) = api_key.as_deref() {
            tracing::debug!(
                key = %mask_key(key),
                device_id = redacted_device_id(&identity, key),
                device_type = %identity.kind,
                client_ip = %client_ip,
                method = %request.method(),
                path = %request.uri().path(),
                headers = %redact_headers(request.headers(), key),
                "device-binding: incoming request"
            );
        }
    }

    guard
        .check(api_key.as_deref(), &identity, &client_ip)
        .await
        .into_result()?;

    request
        .extensions_mut()
        .insert(DeviceContext { client_ip, identity });

    Ok(next.run(request).await)
}
