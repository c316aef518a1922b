use anyhow::Result;
use async_trait::async_trait;
use sqlx::{sqlite::SqliteConnectOptions, sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use std::path::Path;

use crate::history::KeyValueStore;

pub async fn init_db(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_pool(db_path: &Path) -> Result<Pool<Sqlite>> {
    let opts = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await?;

    init_db(&pool).await?;
    Ok(pool)
}

/// Key/value storage in the app's SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query(r#"SELECT value FROM kv WHERE key = ?1"#)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match row {
            Some(row) => Some(row.try_get("value")?),
            None => None,
        })
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{HistoryStore, HISTORY_KEY};
    use crate::utils::db_path;
    use std::sync::Arc;

    #[tokio::test]
    async fn values_survive_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let file = db_path(dir.path());

        let store = SqliteStore::new(create_pool(&file).await.unwrap());
        assert_eq!(store.get("missing").await.unwrap(), None);
        store.set("k", "one").await.unwrap();
        store.set("k", "two").await.unwrap();
        drop(store);

        let reopened = SqliteStore::new(create_pool(&file).await.unwrap());
        assert_eq!(reopened.get("k").await.unwrap().as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn history_round_trips_through_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_pool(&db_path(dir.path())).await.unwrap();
        let store = Arc::new(SqliteStore::new(pool));
        let history = HistoryStore::new(store.clone());

        history.append("first", "https://cdn/1.png").await.unwrap();
        history.append("second", "https://cdn/2.png").await.unwrap();

        let prompts: Vec<_> = history.read_all().await.into_iter().map(|e| e.prompt).collect();
        assert_eq!(prompts, ["second", "first"]);
        assert!(store.get(HISTORY_KEY).await.unwrap().is_some());
    }
}
