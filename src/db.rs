//! SQLite connection pool and embedded schema migrations.
//!
//! Every connection is opened with `PRAGMA foreign_keys = ON` so that deleting a
//! user or task cascades through the schema.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::error::AppError;

/// Opens a pool for `url`, creating the database file if needed.
///
/// In-memory databases live only as long as their connection, so they get a
/// single connection that is never recycled.
pub async fn connect(url: &str, max_connections: u32) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = if url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?
    };

    log::debug!("Opened database pool for {}", url);
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    log::info!("Database migrations applied");
    Ok(())
}

/// Convenience for tests and tooling: a migrated in-memory database.
pub async fn memory_pool() -> Result<SqlitePool, AppError> {
    let pool = connect("sqlite::memory:", 1).await?;
    migrate(&pool).await?;
    Ok(pool)
}
