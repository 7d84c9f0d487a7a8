//! Device Binding Guard - Main Application Entry Point
//!
//! An API gateway guard that binds every API key to the device that first
//! used it, bans keys used from two IPs within a short window, and exposes a
//! management API to list, reset and unban bindings.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Binding Store**: PostgreSQL with sqlx, or in-memory when no database is configured
//! - **Authentication**: API key with SHA-256 hashing, separate management key
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Pick the binding store and key directory (database or in-memory)
//! 3. Build HTTP router with routes and middleware
//! 4. Start server on configured port

mod clock;
mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod redact;
mod routes;
mod services;
mod state;
mod store;

use std::{net::SocketAddr, sync::Arc};

use clock::{Clock, SystemClock};
use middleware::auth::KeyDirectory;
use state::AppState;
use store::{BindingStore, MemoryBindingStore, PgBindingStore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;
    tracing::info!(?config, "Configuration loaded");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let (store, keys): (Arc<dyn BindingStore>, KeyDirectory) = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url).await?;
            tracing::info!("Database pool created");

            db::run_migrations(&pool).await?;
            tracing::info!("Database migrations complete");

            (
                Arc::new(PgBindingStore::new(pool.clone())),
                KeyDirectory::Database(pool),
            )
        }
        None => {
            if config.api_keys.is_empty() {
                tracing::warn!("Neither DATABASE_URL nor API_KEYS set, every API request will be rejected");
            }
            tracing::info!("Using in-memory binding store, bindings are per-instance");

            (
                Arc::new(MemoryBindingStore::with_clock(clock.clone())),
                KeyDirectory::from_keys(&config.api_keys),
            )
        }
    };

    let state = AppState::new(store, keys, &config, clock);
    let app = routes::build_router(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Peer addresses feed client IP resolution
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
