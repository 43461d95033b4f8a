//! Database initialization
//!
//! Opens (creating if missing) the embedded SQLite file and creates the
//! `codes` and `mappings` tables. Safe to call on every startup.

use crate::config::DEFAULT_MAX_CONNECTIONS;
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    init_database_with(db_path, DEFAULT_MAX_CONNECTIONS).await
}

/// Same as [`init_database`] with an explicit pool size
pub async fn init_database_with(db_path: &Path, max_connections: u32) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // WAL lets lookups proceed while an upload transaction is writing.
    // synchronous stays at the sqlx default (FULL) so a returned write is on disk.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create both tables (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_codes_table(pool).await?;
    create_mappings_table(pool).await?;
    Ok(())
}

async fn create_codes_table(pool: &SqlitePool) -> Result<()> {
    // No uniqueness constraint: (terminology, year, code) may repeat
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS codes (
            terminology TEXT NOT NULL,
            year INTEGER NOT NULL,
            code TEXT NOT NULL,
            description TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_mappings_table(pool: &SqlitePool) -> Result<()> {
    // AUTOINCREMENT: ids strictly increase and are never reused, even after
    // the highest row is removed by hand
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mappings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_terminology TEXT NOT NULL,
            source_year INTEGER NOT NULL,
            source_code TEXT NOT NULL,
            target_terminology TEXT NOT NULL,
            target_year INTEGER NOT NULL,
            target_code TEXT NOT NULL,
            responsible TEXT NOT NULL,
            timestamp TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
