//! Data models shared by the store, the guard and the HTTP layer.

/// API key records and hashing
pub mod api_key;
/// Device binding records
pub mod binding;
