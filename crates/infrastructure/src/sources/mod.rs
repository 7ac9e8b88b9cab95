//! 主机采集源
//!
//! 每个采集源由一个 [`Sampler`] 和一张静态表结构组成。`retrieve` 在阻塞线程中采样，
//! 采样失败时仍写入一行（缺失的列取默认值），保证每个周期每张表都有一行。

pub mod cpu;
pub mod memory;
pub mod network;
pub mod process;
pub mod storage;

use async_trait::async_trait;
use hoststat_core::{
    models::{AggregateSummary, Epoch, MetricSample, TableSchema},
    traits::{MetricSource, MetricStore},
    HostStatError, HostStatResult,
};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::observability::{MetricsCollector, StructuredLogger};

pub use cpu::{CpuSampler, CPU_SCHEMA};
pub use memory::{MemorySampler, MEMORY_SCHEMA};
pub use network::{NetworkSampler, NETWORK_SCHEMA};
pub use process::{ProcessSampler, PROCESS_SCHEMA};
pub use storage::{StorageSampler, STORAGE_SCHEMA};

/// 一类主机计数器的采样器
pub trait Sampler: Send + 'static {
    fn schema(&self) -> &'static TableSchema;

    /// 把本次读数写入 `sample`，出错前已写入的列会被保留
    fn sample(&mut self, sample: &mut MetricSample) -> anyhow::Result<()>;
}

/// 以 [`Sampler`] 为数据来源、以 [`MetricStore`] 为存储的采集源
pub struct HostMetricSource<S: Sampler> {
    name: String,
    schema: &'static TableSchema,
    sampler: Arc<Mutex<S>>,
    store: Arc<dyn MetricStore>,
    metrics: MetricsCollector,
}

impl<S: Sampler> HostMetricSource<S> {
    pub fn new(name: impl Into<String>, sampler: S, store: Arc<dyn MetricStore>) -> Self {
        Self {
            name: name.into(),
            schema: sampler.schema(),
            sampler: Arc::new(Mutex::new(sampler)),
            store,
            metrics: MetricsCollector::new(),
        }
    }

    async fn take_sample(&self, epoch: Epoch) -> HostStatResult<MetricSample> {
        let sampler = Arc::clone(&self.sampler);
        let (sample, outcome) = tokio::task::spawn_blocking(move || {
            let mut sample = MetricSample::new(epoch);
            let outcome = match sampler.lock() {
                Ok(mut guard) => guard.sample(&mut sample),
                Err(_) => Err(anyhow::anyhow!("采样器锁已中毒")),
            };
            (sample, outcome)
        })
        .await
        .map_err(|e| HostStatError::Internal(format!("采样任务异常退出: {e}")))?;

        if let Err(e) = outcome {
            self.metrics.record_source_failure(&self.name);
            StructuredLogger::log_source_fetch_failed(&self.name, epoch.value(), e.as_ref());
        }

        Ok(sample)
    }
}

#[async_trait]
impl<S: Sampler> MetricSource for HostMetricSource<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &TableSchema {
        self.schema
    }

    async fn initialize(&self) -> HostStatResult<()> {
        self.store.ensure_table(self.schema).await
    }

    async fn retrieve(&self, epoch: Epoch) -> HostStatResult<()> {
        let sample = self.take_sample(epoch).await?;
        let row_id = self.store.insert_sample(self.schema, &sample).await?;
        debug!(
            "采集完成: source={}, epoch={}, row_id={}",
            self.name, epoch, row_id
        );
        Ok(())
    }

    async fn data_as_json(&self, limit: u32) -> HostStatResult<Vec<serde_json::Value>> {
        self.store.recent_samples(self.schema, limit).await
    }

    async fn aggregate_as_json(&self, column: &str) -> HostStatResult<AggregateSummary> {
        self.store.aggregate(self.schema, column).await
    }
}

/// 按名称构造采集源并建表
pub async fn build_sources(
    names: &[String],
    store: Arc<dyn MetricStore>,
) -> HostStatResult<Vec<Arc<dyn MetricSource>>> {
    let mut sources: Vec<Arc<dyn MetricSource>> = Vec::with_capacity(names.len());

    for name in names {
        let source: Arc<dyn MetricSource> = match name.as_str() {
            "cpu" => Arc::new(HostMetricSource::new(name, CpuSampler::new(), store.clone())),
            "memory" => Arc::new(HostMetricSource::new(name, MemorySampler::new(), store.clone())),
            "storage" => Arc::new(HostMetricSource::new(name, StorageSampler::new(), store.clone())),
            "network" => Arc::new(HostMetricSource::new(name, NetworkSampler::new(), store.clone())),
            "process" => Arc::new(HostMetricSource::new(name, ProcessSampler::new(), store.clone())),
            other => {
                return Err(HostStatError::ProviderNotFound {
                    name: other.to_string(),
                })
            }
        };
        source.initialize().await?;
        sources.push(source);
    }

    Ok(sources)
}
