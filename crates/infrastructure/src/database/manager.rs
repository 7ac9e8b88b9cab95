use hoststat_core::{
    config::DatabaseConfig,
    traits::{MetricStore, ScriptRepository},
    HostStatError, HostStatResult,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{SqliteMetricStore, SqliteScriptRepository};

/// 统一的数据库管理器
///
/// 持有SQLite连接池，负责建库、迁移与仓库实例的创建。
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// 按配置打开数据库并运行迁移
    pub async fn new(config: &DatabaseConfig) -> HostStatResult<Self> {
        let in_memory = config.is_in_memory();

        let mut connect_options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true);

        if in_memory {
            debug!("使用内存SQLite数据库");
        } else {
            connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
            Self::ensure_parent_dir(connect_options.get_filename()).await?;
        }

        // 内存数据库每个连接各自独立，只能使用单连接且不能回收
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        };

        let pool = pool_options
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .connect_with(connect_options)
            .await?;

        Self::run_migrations(&pool).await?;

        info!("数据库已就绪: {}", config.url);
        Ok(Self { pool })
    }

    /// 内存数据库，主要用于测试
    pub async fn in_memory() -> HostStatResult<Self> {
        Self::new(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..DatabaseConfig::default()
        })
        .await
    }

    async fn ensure_parent_dir(filename: &Path) -> HostStatResult<()> {
        if let Some(parent) = filename.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    HostStatError::Configuration(format!(
                        "无法创建数据库目录 {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// 运行数据库迁移
    async fn run_migrations(pool: &SqlitePool) -> HostStatResult<()> {
        debug!("Running SQLite database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scripts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                source_text TEXT NOT NULL,
                counter_path TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        debug!("Successfully completed SQLite database migrations");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn health_check(&self) -> HostStatResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await
    }

    pub fn script_repository(&self) -> Arc<dyn ScriptRepository> {
        Arc::new(SqliteScriptRepository::new(self.pool.clone()))
    }

    pub fn metric_store(&self) -> Arc<dyn MetricStore> {
        Arc::new(SqliteMetricStore::new(self.pool.clone()))
    }
}
