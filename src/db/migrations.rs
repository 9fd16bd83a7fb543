//! SQLite bootstrap for the position store.

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteSynchronous,
};
use sqlx::Row;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Bumped whenever `schema.sql` gains a statement that older databases lack.
pub const SCHEMA_VERSION: i64 = 1;

/// Open (creating if needed) the position database and bring its schema up to date.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).ok();
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .after_connect(|conn, _meta| Box::pin(async move { log_journal_mode(conn).await }))
        .connect_with(options)
        .await?;

    let version = run_migrations(&pool).await?;
    info!(path = %db_path, schema_version = version, "Position store ready");
    Ok(pool)
}

/// Apply `schema.sql` when the stored `user_version` is behind. Returns the resulting version.
async fn run_migrations(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let current: i64 = sqlx::query("PRAGMA user_version")
        .fetch_one(pool)
        .await?
        .get(0);
    if current >= SCHEMA_VERSION {
        debug!(schema_version = current, "Schema up to date");
        return Ok(current);
    }

    info!(from = current, to = SCHEMA_VERSION, "Migrating position schema");
    let mut tx = pool.begin().await?;
    for statement in include_str!("schema.sql").split(';') {
        let trimmed = statement.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(&mut *tx).await?;
        }
    }
    // PRAGMA does not accept bound parameters.
    sqlx::query(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(SCHEMA_VERSION)
}

async fn log_journal_mode(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    let mode: String = sqlx::query("PRAGMA journal_mode")
        .fetch_one(&mut *conn)
        .await?
        .get(0);
    debug!(journal_mode = %mode, "SQLite connection opened");
    Ok(())
}
