use std::sync::Arc;

use anyhow::{Context, Result};
use hoststat_api::{create_app, AppState};
use hoststat_core::{
    config::AppConfig,
    traits::{CounterProvider, TickProcessor},
};
use hoststat_dispatcher::CollectionScheduler;
use hoststat_infrastructure::{build_sources, DatabaseManager, SysinfoCounterProvider};
use hoststat_script::ScriptEngine;
use hoststat_worker::WorkerPool;
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{error, info, warn};

/// 主应用程序
///
/// 持有数据库、线程池、脚本引擎与采集调度器，负责按配置启动各组件并按顺序关闭。
pub struct Application {
    config: Arc<AppConfig>,
    database: DatabaseManager,
    pool: Arc<WorkerPool>,
    engine: Arc<ScriptEngine>,
    scheduler: Arc<CollectionScheduler>,
    hostname: String,
}

impl Application {
    /// 创建新的应用实例
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化应用程序");

        let database = DatabaseManager::new(&config.database)
            .await
            .context("打开数据库失败")?;

        let pool = Arc::new(WorkerPool::start(&config.worker_pool).context("启动线程池失败")?);

        let counters: Arc<dyn CounterProvider> = Arc::new(SysinfoCounterProvider::new());
        let engine = Arc::new(ScriptEngine::new(
            database.script_repository(),
            database.metric_store(),
            counters,
            Arc::clone(&pool),
            &config.scripting,
        ));

        let mut processors: Vec<Arc<dyn TickProcessor>> = Vec::new();
        if config.scripting.enabled {
            let registered = engine.register_all().await.context("加载脚本失败")?;
            info!("已注册 {} 个脚本", registered);
            processors.push(engine.clone());
        } else {
            warn!("脚本引擎已禁用");
        }

        let sources = build_sources(&config.collector.sources, database.metric_store())
            .await
            .context("创建采集源失败")?;

        let scheduler = Arc::new(CollectionScheduler::new(
            Arc::clone(&pool),
            sources,
            processors,
            config.collector.clone(),
        ));

        let hostname = hostname::get()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|e| {
                warn!("获取主机名失败: {}", e);
                "unknown".to_string()
            });

        Ok(Self {
            config: Arc::new(config),
            database,
            pool,
            engine,
            scheduler,
            hostname,
        })
    }

    /// 运行应用程序，直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        if self.config.collector.enabled {
            self.scheduler.start().context("启动采集调度器失败")?;
            info!(
                "采集调度器已启动，采集间隔: {:?}",
                self.scheduler.effective_interval()
            );
        } else {
            warn!("采集已禁用，仅提供API服务");
        }

        let server_handle = if self.config.api.enabled {
            Some(self.spawn_api(shutdown_rx.resubscribe()).await?)
        } else {
            None
        };

        let _ = shutdown_rx.recv().await;
        info!("应用程序收到关闭信号");

        if let Some(handle) = server_handle {
            if let Err(e) = handle.await {
                error!("API服务器任务异常退出: {}", e);
            }
        }

        self.shutdown().await;
        Ok(())
    }

    async fn spawn_api(
        &self,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<tokio::task::JoinHandle<()>> {
        let state = AppState {
            engine: Arc::clone(&self.engine),
            scheduler: Arc::clone(&self.scheduler),
            config: Arc::clone(&self.config),
            hostname: self.hostname.clone(),
        };
        let app = create_app(state, &self.config.api);

        let listener = TcpListener::bind(&self.config.api.bind_address)
            .await
            .with_context(|| format!("绑定地址失败: {}", self.config.api.bind_address))?;

        info!("API服务器启动在 http://{}", self.config.api.bind_address);

        Ok(tokio::spawn(async move {
            let result = axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await;
            if let Err(e) = result {
                error!("API服务器运行失败: {}", e);
            }
        }))
    }

    /// 按顺序关闭：调度器 → 脚本引擎 → 线程池 → 数据库
    async fn shutdown(&self) {
        self.scheduler.stop().await;
        self.engine.stop();
        self.pool.shutdown().await;
        self.database.close().await;
        info!("应用程序已停止");
    }
}
