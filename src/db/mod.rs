use std::time::Duration;

use anyhow::Context;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Sqlite, SqlitePool, Transaction};

pub mod numbering;

pub async fn init() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&database_url)
        .await
        .context("failed to connect to database")?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    tracing::info!("database ready");

    Ok(pool)
}

/// Opens a transaction that already holds the database write lock.
///
/// A plain `BEGIN` is deferred: a transaction that reads first and writes
/// later fails with `SQLITE_BUSY` when another writer got there in between,
/// without waiting on the busy timeout. Issuing a write as the first
/// statement makes competing writers queue up instead, so state checks made
/// after this call see the latest committed row.
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    // Matches no rows; the statement still takes the write lock.
    sqlx::query("UPDATE sessions SET revoked_at = revoked_at WHERE 0")
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}
