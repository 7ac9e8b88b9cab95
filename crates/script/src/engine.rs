use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use hoststat_core::{
    config::ScriptingConfig,
    models::{Epoch, ScriptDefinition, ScriptList, SCRIPT_DATA_SCHEMA},
    traits::{CounterHandle, CounterProvider, MetricStore, ScriptRepository, TickProcessor},
    HostStatError, HostStatResult,
};
use hoststat_infrastructure::{MetricsCollector, StructuredLogger};
use hoststat_worker::{TargetWorker, WorkerPool};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::runtime::{run_script, ExecutionEnv, ScriptRuntime};
use crate::sandbox::{check_syntax, ContextGauge, SandboxLimits};

/// 脚本引擎
///
/// 维护已注册脚本表，处理脚本的增删改，并在每个采集周期把所有脚本投递到线程池执行。
/// 注册表的修改与遍历都在同一把锁内，持锁期间不等待任何正在执行的脚本。
pub struct ScriptEngine {
    repository: Arc<dyn ScriptRepository>,
    counters: Arc<dyn CounterProvider>,
    pool: Arc<WorkerPool>,
    registry: Mutex<BTreeMap<String, Arc<ScriptRuntime>>>,
    env: Arc<ExecutionEnv>,
}

impl ScriptEngine {
    pub fn new(
        repository: Arc<dyn ScriptRepository>,
        store: Arc<dyn MetricStore>,
        counters: Arc<dyn CounterProvider>,
        pool: Arc<WorkerPool>,
        config: &ScriptingConfig,
    ) -> Self {
        Self {
            repository,
            counters,
            pool,
            registry: Mutex::new(BTreeMap::new()),
            env: Arc::new(ExecutionEnv {
                store,
                limits: SandboxLimits::from(config),
                stopping: AtomicBool::new(false),
                metrics: MetricsCollector::new(),
            }),
        }
    }

    /// 加载持久化的全部脚本，返回注册成功的数量
    ///
    /// 同时确保 `script_data` 表存在。计数器无法打开的脚本记录日志后跳过。
    #[instrument(skip(self))]
    pub async fn register_all(&self) -> HostStatResult<usize> {
        self.env.store.ensure_table(&SCRIPT_DATA_SCHEMA).await?;

        let definitions = self.repository.list().await?;
        let mut registry = self.registry.lock().await;

        for definition in definitions {
            match self.open_counter(&definition.counter_path).await {
                Ok(counter) => {
                    let name = definition.name.clone();
                    registry.insert(name, Arc::new(ScriptRuntime::new(definition, counter)));
                }
                Err(e) => {
                    warn!("脚本 {} 注册失败，已跳过: {}", definition.name, e);
                }
            }
        }

        self.env.metrics.update_registered_scripts(registry.len());
        info!("已注册 {} 个脚本", registry.len());
        Ok(registry.len())
    }

    /// 新增脚本：持久化后立即参与下一个采集周期
    #[instrument(skip(self, definition), fields(script = %definition.name))]
    pub async fn save(&self, definition: ScriptDefinition) -> HostStatResult<()> {
        let mut registry = self.registry.lock().await;

        if registry.contains_key(&definition.name)
            || self.repository.find_by_name(&definition.name).await?.is_some()
        {
            return Err(HostStatError::ScriptAlreadyExists {
                name: definition.name,
            });
        }

        let counter = self.prepare(&definition).await?;
        self.repository.create(&definition).await?;

        StructuredLogger::log_registry_change(
            "save",
            &definition.name,
            Some(&definition.counter_path),
        );
        registry.insert(
            definition.name.clone(),
            Arc::new(ScriptRuntime::new(definition, counter)),
        );
        self.env.metrics.update_registered_scripts(registry.len());
        Ok(())
    }

    /// 修改已注册脚本的内容与计数器路径
    #[instrument(skip(self, source_text, counter_path))]
    pub async fn update(
        &self,
        name: &str,
        source_text: String,
        counter_path: String,
    ) -> HostStatResult<()> {
        let registry = self.registry.lock().await;
        let runtime = registry
            .get(name)
            .cloned()
            .ok_or_else(|| HostStatError::ScriptNotFound {
                name: name.to_string(),
            })?;

        let definition = ScriptDefinition::new(name, source_text, counter_path);
        let counter = self.prepare(&definition).await?;

        if !self.repository.update(&definition).await? {
            return Err(HostStatError::ScriptNotFound {
                name: name.to_string(),
            });
        }

        StructuredLogger::log_registry_change("update", name, Some(&definition.counter_path));
        runtime.replace(definition, counter);
        Ok(())
    }

    /// 删除脚本，之后的采集周期不再执行它
    #[instrument(skip(self))]
    pub async fn delete(&self, name: &str) -> HostStatResult<()> {
        let mut registry = self.registry.lock().await;

        let deleted = self.repository.delete(name).await?;
        let unregistered = registry.remove(name).is_some();
        if !deleted && !unregistered {
            return Err(HostStatError::ScriptNotFound {
                name: name.to_string(),
            });
        }

        StructuredLogger::log_registry_change("delete", name, None);
        self.env.metrics.update_registered_scripts(registry.len());
        Ok(())
    }

    /// 把所有已注册脚本投递到线程池，返回成功投递的数量
    pub async fn process(&self, epoch: Epoch) -> HostStatResult<usize> {
        if self.is_stopping() {
            return Ok(0);
        }

        let registry = self.registry.lock().await;
        let mut submitted = 0;

        for runtime in registry.values() {
            let task = run_script(Arc::clone(runtime), epoch, Arc::clone(&self.env));
            // 拒绝原因已由线程池记录
            if self.pool.submit(TargetWorker::Any, task).is_ok() {
                submitted += 1;
            }
        }

        Ok(submitted)
    }

    /// 停止引擎：之后的 `process` 不再投递，排队中的脚本开始执行前即返回
    ///
    /// 正在执行的脚本不会被中断。
    pub fn stop(&self) {
        if !self.env.stopping.swap(true, Ordering::AcqRel) {
            info!("脚本引擎已停止");
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.env.is_stopping()
    }

    pub async fn list(&self) -> HostStatResult<ScriptList> {
        Ok(ScriptList {
            scripts: self.repository.list().await?,
        })
    }

    /// 以 `{"scripts": [...]}` 形式列出持久化的脚本
    pub async fn list_as_json(&self) -> HostStatResult<Value> {
        Ok(serde_json::to_value(self.list().await?)?)
    }

    pub async fn registered_names(&self) -> Vec<String> {
        self.registry.lock().await.keys().cloned().collect()
    }

    pub async fn context_gauge(&self, name: &str) -> Option<Arc<ContextGauge>> {
        self.registry.lock().await.get(name).map(|r| r.gauge())
    }

    async fn prepare(&self, definition: &ScriptDefinition) -> HostStatResult<Box<dyn CounterHandle>> {
        definition.validate()?;
        check_syntax(&definition.name, &definition.source_text)?;
        self.open_counter(&definition.counter_path).await
    }

    // 打开计数器会触发一次系统刷新，放到阻塞线程上
    async fn open_counter(&self, path: &str) -> HostStatResult<Box<dyn CounterHandle>> {
        let counters = Arc::clone(&self.counters);
        let path = path.to_string();
        tokio::task::spawn_blocking(move || counters.open(&path))
            .await
            .map_err(|e| HostStatError::Internal(format!("打开计数器失败: {e}")))?
    }
}

#[async_trait]
impl TickProcessor for ScriptEngine {
    fn name(&self) -> &str {
        "scripts"
    }

    async fn process(&self, epoch: Epoch) -> HostStatResult<()> {
        ScriptEngine::process(self, epoch).await.map(|_| ())
    }
}
