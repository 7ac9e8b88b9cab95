use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use hoststat_core::{
    models::{Epoch, MetricSample, ScriptDefinition, SCRIPT_DATA_SCHEMA},
    traits::{CounterHandle, MetricStore},
    HostStatError, HostStatResult,
};
use hoststat_infrastructure::{MetricsCollector, StructuredLogger};
use tracing::{debug, warn};

use crate::host::{BoundHost, PersistedValue};
use crate::sandbox::{ContextGauge, SandboxLimits, ScriptContext};

/// 所有脚本共享的执行环境
pub(crate) struct ExecutionEnv {
    pub store: Arc<dyn MetricStore>,
    pub limits: SandboxLimits,
    pub stopping: AtomicBool,
    pub metrics: MetricsCollector,
}

impl ExecutionEnv {
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }
}

#[derive(Clone)]
struct ScriptState {
    definition: ScriptDefinition,
    counter: Arc<Mutex<Box<dyn CounterHandle>>>,
}

/// 已注册的脚本
///
/// 执行锁在整个执行期间持有，同一脚本任意时刻最多只有一个执行上下文存活。
/// 脚本内容与计数器放在单独的同步锁里，更新只替换它，不等待正在进行的执行；
/// 每次执行开始时取一份快照，新内容从下一次执行起生效。
pub struct ScriptRuntime {
    name: String,
    execution: tokio::sync::Mutex<()>,
    state: Mutex<ScriptState>,
    gauge: Arc<ContextGauge>,
}

impl ScriptRuntime {
    pub(crate) fn new(definition: ScriptDefinition, counter: Box<dyn CounterHandle>) -> Self {
        Self {
            name: definition.name.clone(),
            execution: tokio::sync::Mutex::new(()),
            state: Mutex::new(ScriptState {
                definition,
                counter: Arc::new(Mutex::new(counter)),
            }),
            gauge: Arc::new(ContextGauge::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn gauge(&self) -> Arc<ContextGauge> {
        Arc::clone(&self.gauge)
    }

    pub fn definition(&self) -> ScriptDefinition {
        self.snapshot().definition
    }

    /// 替换脚本内容与计数器，立即返回，正在进行的执行仍使用旧内容
    pub(crate) fn replace(&self, definition: ScriptDefinition, counter: Box<dyn CounterHandle>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.definition = definition;
        state.counter = Arc::new(Mutex::new(counter));
    }

    fn snapshot(&self) -> ScriptState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 在新的沙箱上下文中执行一次，返回写入的值个数
    ///
    /// 执行失败时，失败前已 `persist` 的值仍会写入。
    pub(crate) async fn execute(&self, epoch: Epoch, env: &ExecutionEnv) -> HostStatResult<usize> {
        let running = self.execution.lock().await;
        if env.is_stopping() {
            debug!("脚本引擎已停止，跳过脚本: {}", self.name);
            return Ok(0);
        }

        let ScriptState {
            definition,
            counter,
        } = self.snapshot();
        let host = Arc::new(BoundHost::new(counter));
        let bridge = Arc::clone(&host);
        let limits = env.limits.clone();
        let gauge = Arc::clone(&self.gauge);

        let result = tokio::task::spawn_blocking(move || {
            let mut context = ScriptContext::new(&definition.name, bridge, &limits, &gauge);
            context.run(&definition.source_text)
        })
        .await
        .map_err(|e| HostStatError::Internal(format!("脚本执行线程异常: {e}")))?;

        let written = self
            .write_persisted(epoch, host.take_persisted(), env)
            .await;
        drop(running);

        result.map(|_| written)
    }

    async fn write_persisted(
        &self,
        epoch: Epoch,
        values: Vec<PersistedValue>,
        env: &ExecutionEnv,
    ) -> usize {
        let mut written = 0;
        for persisted in values {
            if !persisted.value.is_finite() {
                warn!("脚本 {} 写入了非有限数值，已忽略", self.name);
                continue;
            }

            let mut sample = MetricSample::new(epoch).with_timestamp(persisted.timestamp);
            sample
                .set("script_name", self.name.as_str())
                .set("value", persisted.value);

            match env.store.insert_sample(&SCRIPT_DATA_SCHEMA, &sample).await {
                Ok(_) => written += 1,
                Err(e) => StructuredLogger::log_system_error("script_engine", "persist", &e),
            }
        }
        written
    }
}

/// 脚本任务在线程池中的执行入口
pub(crate) async fn run_script(runtime: Arc<ScriptRuntime>, epoch: Epoch, env: Arc<ExecutionEnv>) {
    let started = Instant::now();
    match runtime.execute(epoch, &env).await {
        Ok(persisted) => {
            let elapsed = started.elapsed();
            env.metrics.record_script_run(elapsed.as_secs_f64());
            StructuredLogger::log_script_executed(
                runtime.name(),
                epoch.value(),
                persisted,
                elapsed.as_millis() as u64,
            );
        }
        Err(e) => {
            env.metrics.record_script_failure(failure_kind(&e));
            StructuredLogger::log_script_failed(runtime.name(), epoch.value(), &e);
        }
    }
}

fn failure_kind(err: &HostStatError) -> &'static str {
    match err {
        HostStatError::ScriptCompile { .. } => "compile",
        HostStatError::ScriptEntryPointMissing { .. } => "entry_point",
        HostStatError::ScriptTimeout { .. } => "timeout",
        HostStatError::ScriptRuntime { .. } => "runtime",
        _ => "internal",
    }
}
