//! HTTP middleware components.
//!
//! Protected routes run `auth` first, then `device_binding`. Management
//! routes run `management` only.

/// API key authentication middleware
pub mod auth;
/// Device binding guard middleware
pub mod device_binding;
/// Management key authentication middleware
pub mod management;
