mod models;
mod seeders;

pub use models::*;
pub use seeders::seed_demo_catalog;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

pub type DbPool = SqlitePool;

/// Execute a SQL migration file, properly handling comments
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in sql.split(';') {
        // Strip SQL comment lines (lines starting with --)
        let cleaned: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = cleaned.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }
    Ok(())
}

pub async fn init(data_dir: &Path) -> Result<DbPool> {
    let db_path = data_dir.join("bookery.db");

    info!("Initializing database at {}", db_path.display());

    // WAL mode and foreign keys are per-connection options, so they must be
    // applied to every pooled connection rather than via one-off pragmas
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    execute_sql(pool, include_str!("../../migrations/001_catalog.sql")).await?;
    execute_sql(pool, include_str!("../../migrations/002_users.sql")).await?;
    execute_sql(pool, include_str!("../../migrations/003_orders.sql")).await?;
    execute_sql(pool, include_str!("../../migrations/004_reviews.sql")).await?;

    info!("Migrations completed");
    Ok(())
}

/// Whether an error is a UNIQUE-constraint violation.
///
/// The duplicate-email and duplicate-review paths pre-check before inserting,
/// but a concurrent request can still lose the race; callers map this case to
/// the same conflict message the pre-check produces.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.message().contains("UNIQUE constraint failed"),
        _ => false,
    }
}
