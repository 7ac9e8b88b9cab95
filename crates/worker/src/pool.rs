//! 固定大小的工作线程池
//!
//! 每个Worker拥有私有队列，后入队的任务先执行（LIFO）。任务可以指定Worker索引，
//! 也可以交给池随机分配；随机分配时跳过保留Worker，保留Worker只执行显式指定给它的任务。

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use hoststat_core::{config::WorkerPoolConfig, HostStatError, HostStatResult};
use hoststat_infrastructure::{MetricsCollector, StructuredLogger};
use rand::Rng;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 提交到线程池的任务
pub type PoolTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// 采集调度器使用的保留Worker索引
pub const RESERVED_WORKER: usize = 0;

tokio::task_local! {
    static WORKER_INDEX: usize;
}

/// 当前任务所在的Worker索引，不在线程池中执行时返回 `None`
pub fn current_worker() -> Option<usize> {
    WORKER_INDEX.try_with(|index| *index).ok()
}

/// 任务投递目标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetWorker {
    /// 在非保留Worker中随机选择
    Any,
    /// 指定Worker索引
    Index(usize),
}

struct WorkerQueue {
    tasks: Mutex<Vec<PoolTask>>,
    notify: Notify,
}

impl WorkerQueue {
    fn new() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            notify: Notify::new(),
        }
    }

    // 锁内不执行任务，中毒时直接取回数据
    fn lock(&self) -> MutexGuard<'_, Vec<PoolTask>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 工作线程池
pub struct WorkerPool {
    queues: Vec<Arc<WorkerQueue>>,
    reserved_workers: usize,
    stopping: Arc<AtomicBool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    metrics: MetricsCollector,
}

impl WorkerPool {
    /// 创建线程池并启动全部Worker，需在tokio运行时内调用
    pub fn start(config: &WorkerPoolConfig) -> HostStatResult<Self> {
        if config.pool_size == 0 {
            return Err(HostStatError::Configuration(
                "线程池大小必须大于0".to_string(),
            ));
        }
        if config.reserved_workers > config.pool_size {
            return Err(HostStatError::Configuration(format!(
                "保留Worker数量({})不能大于线程池大小({})",
                config.reserved_workers, config.pool_size
            )));
        }

        let stopping = Arc::new(AtomicBool::new(false));
        let metrics = MetricsCollector::new();
        let queues: Vec<Arc<WorkerQueue>> = (0..config.pool_size)
            .map(|_| Arc::new(WorkerQueue::new()))
            .collect();

        let handles = queues
            .iter()
            .enumerate()
            .map(|(index, queue)| {
                tokio::spawn(run_worker(
                    index,
                    Arc::clone(queue),
                    Arc::clone(&stopping),
                    metrics.clone(),
                ))
            })
            .collect();

        info!(
            "线程池已启动: pool_size={}, reserved_workers={}",
            config.pool_size, config.reserved_workers
        );

        Ok(Self {
            queues,
            reserved_workers: config.reserved_workers,
            stopping,
            handles: Mutex::new(handles),
            metrics,
        })
    }

    pub fn pool_size(&self) -> usize {
        self.queues.len()
    }

    pub fn reserved_workers(&self) -> usize {
        self.reserved_workers
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// 各Worker队列中等待执行的任务数
    pub fn queue_depths(&self) -> Vec<usize> {
        self.queues.iter().map(|q| q.lock().len()).collect()
    }

    /// 投递任务，返回实际投递到的Worker索引
    ///
    /// 索引越界或线程池已停止时记录日志并丢弃任务，不会阻塞。
    pub fn submit<F>(&self, target: TargetWorker, task: F) -> HostStatResult<usize>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_stopping() {
            let err = HostStatError::PoolStopped;
            self.reject(&target, &err);
            return Err(err);
        }

        let index = match target {
            TargetWorker::Any => self.pick_worker(),
            TargetWorker::Index(index) if index < self.pool_size() => index,
            TargetWorker::Index(index) => {
                let err = HostStatError::InvalidWorkerIndex {
                    index,
                    pool_size: self.pool_size(),
                };
                self.reject(&target, &err);
                return Err(err);
            }
        };

        let queue = &self.queues[index];
        queue.lock().push(Box::pin(task));
        queue.notify.notify_one();

        Ok(index)
    }

    fn pick_worker(&self) -> usize {
        let last = self.pool_size() - 1;
        let first = if self.reserved_workers <= last {
            self.reserved_workers
        } else {
            0
        };
        rand::rng().random_range(first..=last)
    }

    fn reject(&self, target: &TargetWorker, err: &HostStatError) {
        self.metrics.record_pool_rejection();
        StructuredLogger::log_pool_rejection(&format!("{target:?}"), err);
    }

    /// 请求停止：Worker执行完手头的任务后退出，队列中剩余任务被丢弃
    pub fn stop(&self) {
        if self.stopping.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("线程池正在停止");
        for queue in &self.queues {
            queue.notify.notify_one();
        }
    }

    /// 停止并等待全部Worker退出
    pub async fn shutdown(&self) {
        self.stop();

        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
            guard.drain(..).collect()
        };

        for (index, handle) in handles.into_iter().enumerate() {
            if let Err(e) = handle.await {
                error!("Worker {} 退出异常: {}", index, e);
            }
        }
        info!("线程池已关闭");
    }
}

async fn run_worker(
    index: usize,
    queue: Arc<WorkerQueue>,
    stopping: Arc<AtomicBool>,
    metrics: MetricsCollector,
) {
    debug!("Worker {} 已启动", index);

    loop {
        if stopping.load(Ordering::Acquire) {
            break;
        }

        let next = queue.lock().pop();
        match next {
            Some(task) => {
                let outcome = AssertUnwindSafe(WORKER_INDEX.scope(index, task))
                    .catch_unwind()
                    .await;
                if let Err(payload) = outcome {
                    metrics.record_task_panic();
                    error!(
                        "Worker {} 执行的任务发生panic: {}",
                        index,
                        panic_message(payload.as_ref())
                    );
                }
            }
            None => queue.notify.notified().await,
        }
    }

    let discarded = {
        let mut tasks = queue.lock();
        let count = tasks.len();
        tasks.clear();
        count
    };
    if discarded > 0 {
        metrics.record_discarded_tasks(discarded);
        warn!("Worker {} 停止，丢弃 {} 个未执行的任务", index, discarded);
    }

    debug!("Worker {} 已退出", index);
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
