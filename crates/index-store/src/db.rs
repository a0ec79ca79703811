use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

/// Connection handle for the index store.
///
/// Owns the pool and bootstraps both tables from the embedded schema on
/// connect, so a fresh database file is immediately usable by the updater.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    pub async fn new(database_url: &str) -> Result<Self> {
        // WAL keeps readers (influence lookups) unblocked while a series
        // transaction is committing.
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        // Each pooled connection to ':memory:' would open its own private
        // database, so in-memory stores must stay on a single connection.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;

        Ok(db)
    }

    /// Runs the embedded schema statement by statement; every statement is
    /// idempotent (`IF NOT EXISTS`), so reconnecting to an existing store is
    /// a no-op.
    async fn init_schema(&self) -> Result<()> {
        let schema = include_str!("../../../schema.sql");

        for statement in schema.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await?;
            }
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_schema_on_connect() {
        let db = Db::new("sqlite::memory:").await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sector_index_table")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn reconnect_is_idempotent() {
        let db = Db::new("sqlite::memory:").await.unwrap();
        db.init_schema().await.unwrap();
    }
}
