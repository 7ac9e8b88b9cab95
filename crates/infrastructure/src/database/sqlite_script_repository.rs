use async_trait::async_trait;
use chrono::Utc;
use hoststat_core::{
    models::ScriptDefinition, traits::ScriptRepository, HostStatError, HostStatResult,
};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

/// SQLite脚本定义仓库，表 `scripts` 由 [`crate::DatabaseManager`] 迁移创建
pub struct SqliteScriptRepository {
    pool: SqlitePool,
}

impl SqliteScriptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_definition(row: &sqlx::sqlite::SqliteRow) -> HostStatResult<ScriptDefinition> {
        Ok(ScriptDefinition {
            name: row.try_get("name")?,
            source_text: row.try_get("source_text")?,
            counter_path: row.try_get("counter_path")?,
        })
    }
}

#[async_trait]
impl ScriptRepository for SqliteScriptRepository {
    async fn list(&self) -> HostStatResult<Vec<ScriptDefinition>> {
        let rows = sqlx::query("SELECT name, source_text, counter_path FROM scripts ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_definition).collect()
    }

    async fn find_by_name(&self, name: &str) -> HostStatResult<Option<ScriptDefinition>> {
        let row = sqlx::query(
            "SELECT name, source_text, counter_path FROM scripts WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_definition).transpose()
    }

    #[instrument(skip(self, definition), fields(script_name = %definition.name))]
    async fn create(&self, definition: &ScriptDefinition) -> HostStatResult<()> {
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO scripts (name, source_text, counter_path, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&definition.name)
        .bind(&definition.source_text)
        .bind(&definition.counter_path)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!("已保存脚本定义: {}", definition.name);
                Ok(())
            }
            Err(e) => {
                let err = HostStatError::from(e);
                if err.is_unique_violation() {
                    Err(HostStatError::ScriptAlreadyExists {
                        name: definition.name.clone(),
                    })
                } else {
                    Err(err)
                }
            }
        }
    }

    #[instrument(skip(self, definition), fields(script_name = %definition.name))]
    async fn update(&self, definition: &ScriptDefinition) -> HostStatResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scripts
            SET source_text = $1, counter_path = $2, updated_at = $3
            WHERE name = $4
            "#,
        )
        .bind(&definition.source_text)
        .bind(&definition.counter_path)
        .bind(Utc::now().timestamp())
        .bind(&definition.name)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, name: &str) -> HostStatResult<bool> {
        let result = sqlx::query("DELETE FROM scripts WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseManager;

    async fn repository() -> (DatabaseManager, Box<dyn ScriptRepository>) {
        let db = DatabaseManager::in_memory().await.unwrap();
        let repo = Box::new(SqliteScriptRepository::new(db.pool().clone()));
        (db, repo)
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let (_db, repo) = repository().await;
        let def = ScriptDefinition::new("cpu_watch", "fn execute() {}", "cpu/usage");

        repo.create(&def).await.unwrap();

        let found = repo.find_by_name("cpu_watch").await.unwrap();
        assert_eq!(found, Some(def));
        assert!(repo.find_by_name("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected_and_original_kept() {
        let (_db, repo) = repository().await;
        let original = ScriptDefinition::new("dup", "fn execute() { persist(1.0); }", "cpu/usage");
        repo.create(&original).await.unwrap();

        let clash = ScriptDefinition::new("dup", "fn execute() {}", "memory/used");
        let err = repo.create(&clash).await.unwrap_err();
        assert!(matches!(err, HostStatError::ScriptAlreadyExists { ref name } if name == "dup"));

        let stored = repo.find_by_name("dup").await.unwrap().unwrap();
        assert_eq!(stored, original);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (_db, repo) = repository().await;
        repo.create(&ScriptDefinition::new("s", "fn execute() {}", "cpu/usage"))
            .await
            .unwrap();

        let changed = ScriptDefinition::new("s", "fn execute() { persist(2.0); }", "memory/used");
        assert!(repo.update(&changed).await.unwrap());
        assert_eq!(repo.find_by_name("s").await.unwrap(), Some(changed));

        let unknown = ScriptDefinition::new("nope", "fn execute() {}", "cpu/usage");
        assert!(!repo.update(&unknown).await.unwrap());

        assert!(repo.delete("s").await.unwrap());
        assert!(!repo.delete("s").await.unwrap());
        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_is_sorted_by_name() {
        let (_db, repo) = repository().await;
        for name in ["zeta", "alpha", "mid"] {
            repo.create(&ScriptDefinition::new(name, "fn execute() {}", "cpu/usage"))
                .await
                .unwrap();
        }

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }
}
