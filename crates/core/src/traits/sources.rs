use async_trait::async_trait;

use crate::errors::HostStatResult;
use crate::models::{AggregateSummary, Epoch, TableSchema};

/// 采集源
///
/// 每次 `retrieve` 读取一类主机计数器快照，并以周期编号为标签写入一行样本。
#[async_trait]
pub trait MetricSource: Send + Sync {
    fn name(&self) -> &str;

    fn schema(&self) -> &TableSchema;

    /// 建表等初始化工作
    async fn initialize(&self) -> HostStatResult<()>;

    async fn retrieve(&self, epoch: Epoch) -> HostStatResult<()>;

    /// 最近 `limit` 行样本
    async fn data_as_json(&self, limit: u32) -> HostStatResult<Vec<serde_json::Value>>;

    async fn aggregate_as_json(&self, column: &str) -> HostStatResult<AggregateSummary>;
}

/// 每个采集周期在保留Worker上执行一次的处理器
#[async_trait]
pub trait TickProcessor: Send + Sync {
    fn name(&self) -> &str;

    async fn process(&self, epoch: Epoch) -> HostStatResult<()>;
}
