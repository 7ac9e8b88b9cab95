//! 持久化抽象
//!
//! 脚本定义与采集样本分别由 [`ScriptRepository`] 和 [`MetricStore`] 负责。
//! 生产实现基于SQLite，测试使用内存实现。

use async_trait::async_trait;

use crate::errors::HostStatResult;
use crate::models::{AggregateSummary, MetricSample, ScriptDefinition, TableSchema};

/// 脚本定义仓库
#[async_trait]
pub trait ScriptRepository: Send + Sync {
    /// 按名称排序返回全部脚本定义
    async fn list(&self) -> HostStatResult<Vec<ScriptDefinition>>;

    async fn find_by_name(&self, name: &str) -> HostStatResult<Option<ScriptDefinition>>;

    /// 新建脚本定义
    ///
    /// # 错误
    ///
    /// * `ScriptAlreadyExists` - 名称已存在，原有记录保持不变
    async fn create(&self, definition: &ScriptDefinition) -> HostStatResult<()>;

    /// 按名称替换脚本内容与计数器路径，返回是否有记录被更新
    async fn update(&self, definition: &ScriptDefinition) -> HostStatResult<bool>;

    /// 按名称删除，返回是否有记录被删除
    async fn delete(&self, name: &str) -> HostStatResult<bool>;
}

/// 采集样本存储
///
/// 表结构由 [`TableSchema`] 描述，实现方据此生成建表、写入、查询和聚合语句。
/// 调用方传入的列名必须先经过表结构校验。
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// 表不存在时创建
    async fn ensure_table(&self, schema: &TableSchema) -> HostStatResult<()>;

    /// 追加一行样本，返回行ID
    async fn insert_sample(&self, schema: &TableSchema, sample: &MetricSample)
        -> HostStatResult<i64>;

    /// 最近 `limit` 行样本（按行ID倒序），每行为一个JSON对象
    async fn recent_samples(
        &self,
        schema: &TableSchema,
        limit: u32,
    ) -> HostStatResult<Vec<serde_json::Value>>;

    /// 对数值列计算 max/min/avg/total/count
    async fn aggregate(&self, schema: &TableSchema, column: &str)
        -> HostStatResult<AggregateSummary>;
}
