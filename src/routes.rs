//! HTTP router assembly.

use crate::{handlers, middleware, state::AppState};
use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Build the full application router.
///
/// - `/health` is public
/// - `/api/v1/*` requires an API key and passes the device binding guard
/// - `/v0/management/*` requires the management key, and only exists when
///   one is configured
pub fn build_router(state: AppState) -> Router {
    // Layers run outermost-last: auth first, then the device guard
    let protected_routes = Router::new()
        .route("/api/v1/session", get(handlers::session::current_session))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::device_binding::device_binding_middleware,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .merge(protected_routes);

    if state.management.is_some() {
        let management_routes = Router::new()
            .route(
                "/v0/management/device-bindings",
                get(handlers::device_bindings::list_bindings)
                    .delete(handlers::device_bindings::reset_bindings),
            )
            .route(
                "/v0/management/device-bindings/unban",
                post(handlers::device_bindings::unban_key),
            )
            .route_layer(axum_middleware::from_fn_with_state(
                state.clone(),
                middleware::management::management_auth_middleware,
            ));
        app = app.merge(management_routes);
    } else {
        tracing::info!("MANAGEMENT_KEY not set, management API disabled");
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}
