//! SQLite connection factory and migration ledger.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

const LEDGER_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        module     TEXT NOT NULL,
        id         TEXT NOT NULL,
        applied_at TEXT NOT NULL,
        PRIMARY KEY (module, id)
    );
"#;

/// Shared handle to the relational store.
#[derive(Debug, Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Open (creating if missing) the database at `url` with foreign keys enforced.
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid database url '{url}'"))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .with_context(|| format!("failed to connect to '{url}'"))?;

        tracing::info!(target: "bookcat-db", %url, max_connections, "database pool ready");
        Ok(Self { pool })
    }

    /// Single-connection in-memory database. The connection is pinned so the
    /// data lives as long as the pool.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("failed to open in-memory database")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply one migration unless the ledger already records it.
    /// Returns `true` when the migration ran.
    pub async fn apply_migration(&self, module: &str, id: &str, up: &str) -> anyhow::Result<bool> {
        sqlx::raw_sql(LEDGER_DDL)
            .execute(&self.pool)
            .await
            .context("failed to create migration ledger")?;

        let applied: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM _migrations WHERE module = ? AND id = ?")
                .bind(module)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        if applied.is_some() {
            tracing::debug!(target: "bookcat-db", module, id, "migration already applied");
            return Ok(false);
        }

        let mut tx = self.pool.begin().await?;
        sqlx::raw_sql(up)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("migration {module}/{id} failed"))?;
        sqlx::query("INSERT INTO _migrations (module, id, applied_at) VALUES (?, ?, ?)")
            .bind(module)
            .bind(id)
            .bind(chrono::Utc::now())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(target: "bookcat-db", module, id, "migration applied");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migration_runs_once() {
        let db = Db::in_memory().await.unwrap();
        let up = "CREATE TABLE shelf (id INTEGER PRIMARY KEY, label TEXT NOT NULL);";

        assert!(db.apply_migration("shelves", "001_init", up).await.unwrap());
        assert!(!db.apply_migration("shelves", "001_init", up).await.unwrap());

        sqlx::query("INSERT INTO shelf (label) VALUES ('A')")
            .execute(db.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn failed_migration_is_not_recorded() {
        let db = Db::in_memory().await.unwrap();
        assert!(db
            .apply_migration("broken", "001_init", "CREATE TABL nope;")
            .await
            .is_err());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _migrations")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
