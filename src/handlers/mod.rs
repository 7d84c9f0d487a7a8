//! HTTP request handlers (route handlers).

/// Device binding management endpoints
pub mod device_bindings;
/// Health check endpoint
pub mod health;
/// Authenticated session introspection
pub mod session;
