//! 采集调度器
//!
//! 按固定间隔推进采集周期：每个周期把所有采集源投递到非保留Worker，
//! 把周期处理器（脚本引擎）投递到保留Worker，两类负载互不挤占。
//! 采集间隔不低于配置的下限，停止时立即打断等待。

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use hoststat_core::{
    config::CollectorConfig,
    models::{CollectorInfo, Epoch},
    traits::{MetricSource, TickProcessor},
    HostStatError, HostStatResult,
};
use hoststat_infrastructure::{MetricsCollector, StructuredLogger};
use hoststat_worker::{TargetWorker, WorkerPool, RESERVED_WORKER};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// 采集调度器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SchedulerState {
    Idle = 0,
    Running = 1,
    Stopping = 2,
}

impl SchedulerState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SchedulerState::Running,
            2 => SchedulerState::Stopping,
            _ => SchedulerState::Idle,
        }
    }
}

/// 单次周期的投递结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub epoch: Epoch,
    pub sources_submitted: usize,
    pub processors_submitted: usize,
}

/// 采集调度器
///
/// 每个周期读取当前周期编号，把全部采集源投递到线程池（不指定Worker），
/// 把周期处理器（脚本引擎）投递到保留Worker，然后周期编号加一并休眠采集间隔。
/// 周期编号只在内存中递增，进程重启后从0开始。
pub struct CollectionScheduler {
    pool: Arc<WorkerPool>,
    sources: Vec<Arc<dyn MetricSource>>,
    processors: Vec<Arc<dyn TickProcessor>>,
    config: CollectorConfig,
    epoch: AtomicU64,
    state: AtomicU8,
    stop_signal: Notify,
    handle: Mutex<Option<JoinHandle<()>>>,
    metrics: MetricsCollector,
}

impl CollectionScheduler {
    pub fn new(
        pool: Arc<WorkerPool>,
        sources: Vec<Arc<dyn MetricSource>>,
        processors: Vec<Arc<dyn TickProcessor>>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            pool,
            sources,
            processors,
            config,
            epoch: AtomicU64::new(0),
            state: AtomicU8::new(SchedulerState::Idle as u8),
            stop_signal: Notify::new(),
            handle: Mutex::new(None),
            metrics: MetricsCollector::new(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_active(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// 下一个周期将使用的编号
    pub fn current_epoch(&self) -> Epoch {
        Epoch(self.epoch.load(Ordering::Acquire))
    }

    /// 实际采集间隔：配置值与下限中的较大者
    pub fn effective_interval(&self) -> Duration {
        self.config.effective_interval()
    }

    pub fn sources(&self) -> &[Arc<dyn MetricSource>] {
        &self.sources
    }

    pub fn find_source(&self, name: &str) -> HostStatResult<Arc<dyn MetricSource>> {
        self.sources
            .iter()
            .find(|s| s.name() == name)
            .cloned()
            .ok_or_else(|| HostStatError::ProviderNotFound {
                name: name.to_string(),
            })
    }

    pub fn info(&self) -> CollectorInfo {
        CollectorInfo {
            is_active: self.is_active(),
            provider_names: self.sources.iter().map(|s| s.name().to_string()).collect(),
        }
    }

    /// 启动采集循环
    pub fn start(self: &Arc<Self>) -> HostStatResult<()> {
        self.state
            .compare_exchange(
                SchedulerState::Idle as u8,
                SchedulerState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|current| {
                HostStatError::Internal(format!(
                    "采集调度器无法启动，当前状态: {:?}",
                    SchedulerState::from_u8(current)
                ))
            })?;

        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move { scheduler.run_loop().await });
        *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        info!(
            "采集调度器已启动: interval={}ms, sources={}",
            self.effective_interval().as_millis(),
            self.sources.len()
        );
        Ok(())
    }

    /// 请求停止并等待采集循环退出，已投递的任务不受影响
    pub async fn stop(&self) {
        let stopping = self
            .state
            .compare_exchange(
                SchedulerState::Running as u8,
                SchedulerState::Stopping as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if stopping {
            self.stop_signal.notify_one();
        }

        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("采集循环异常退出: {}", e);
            }
        }
        self.state
            .store(SchedulerState::Idle as u8, Ordering::Release);

        if stopping {
            info!("采集调度器已停止");
        }
    }

    async fn run_loop(self: Arc<Self>) {
        let interval = self.effective_interval();

        while self.is_active() {
            let report = self.run_tick();
            StructuredLogger::log_tick_dispatched(
                report.epoch.value(),
                report.sources_submitted,
                report.processors_submitted,
                interval.as_millis() as u64,
            );

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = self.stop_signal.notified() => {}
            }
        }
    }

    /// 执行一个采集周期的投递，不等待任务完成
    pub fn run_tick(&self) -> TickReport {
        let started = Instant::now();
        let epoch = Epoch(self.epoch.fetch_add(1, Ordering::AcqRel));

        let mut sources_submitted = 0;
        for source in &self.sources {
            let source = Arc::clone(source);
            let metrics = self.metrics.clone();
            let task = async move {
                if let Err(e) = source.retrieve(epoch).await {
                    metrics.record_source_failure(source.name());
                    StructuredLogger::log_source_fetch_failed(source.name(), epoch.value(), &e);
                }
            };
            if self.pool.submit(TargetWorker::Any, task).is_ok() {
                sources_submitted += 1;
            }
        }

        let mut processors_submitted = 0;
        for processor in &self.processors {
            let processor = Arc::clone(processor);
            let task = async move {
                if let Err(e) = processor.process(epoch).await {
                    StructuredLogger::log_system_error(processor.name(), "process", &e);
                }
            };
            if self
                .pool
                .submit(TargetWorker::Index(RESERVED_WORKER), task)
                .is_ok()
            {
                processors_submitted += 1;
            }
        }

        self.metrics
            .record_tick(epoch.value(), started.elapsed().as_secs_f64());

        TickReport {
            epoch,
            sources_submitted,
            processors_submitted,
        }
    }
}
