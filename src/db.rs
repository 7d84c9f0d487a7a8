//! Database connection pool and migration management.
//!
//! Only used when `DATABASE_URL` is set: the pool then backs both the
//! `api_keys` lookup and the `device_bindings` store.

use sqlx::{Pool, Postgres};

pub type DbPool = Pool<Postgres>;

/// Create a new PostgreSQL connection pool.
///
/// Every guarded request performs one or two short statements, so a small
/// pool is enough.
///
/// # Errors
///
/// Returns an error if the connection string is invalid or the server
/// cannot be reached.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Run database migrations from the `migrations/` directory.
///
/// Creates the `api_keys` and `device_bindings` tables. Applied migrations
/// are tracked in `_sqlx_migrations`, so each runs once.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
