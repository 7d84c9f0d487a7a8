//! Business logic services.
//!
//! Services hold the device binding logic, separated from HTTP plumbing so
//! that it can be driven directly in tests.

/// Binding decisions and the request-path guard
pub mod decision;
/// Device identity and client IP extraction
pub mod identity;
