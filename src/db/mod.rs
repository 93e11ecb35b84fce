//! Database module for SQLite persistence
//!
//! Holds uploaded file entries and documents with their OCR extraction.

mod documents;
mod schema;

pub use documents::*;
pub use schema::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::document::StoreResult;

/// Create a new database connection pool
pub async fn create_pool(database_url: &str) -> StoreResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run migrations
    initialize_schema(&pool).await?;

    Ok(pool)
}

/// Create an in-memory pool with the schema applied
///
/// Limited to one connection: every SQLite in-memory connection is its own
/// database.
pub async fn create_memory_pool() -> StoreResult<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    initialize_schema(&pool).await?;

    Ok(pool)
}
