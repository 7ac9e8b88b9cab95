//! # 数据模型
//!
//! 定义采集代理的核心数据结构：采集周期（Epoch）、脚本定义、采集样本与表结构、计数器路径。
//!
//! ## 核心模型
//!
//! ### Epoch - 采集周期
//! 单调递增的周期计数，同一周期内派发的所有采集任务与脚本任务共享同一个值，
//! 用于跨表关联同一时刻的样本。
//!
//! ### ScriptDefinition - 脚本定义
//! 运行时可增删改的用户脚本，名称唯一。
//!
//! ### TableSchema / MetricSample - 采集样本
//! 每个采集源由一张静态表结构描述，建表、写入、查询与聚合都由同一份描述生成。
//!
//! ### CounterPath - 计数器路径
//! `object[instance]/counter` 形式的主机计数器地址，例如 `cpu/usage`、`disk[/]/available`。

pub mod counter_path;
pub mod epoch;
pub mod metric;
pub mod script;

pub use counter_path::CounterPath;
pub use epoch::Epoch;
pub use metric::{
    AggregateSummary, CollectorInfo, ColumnDef, ColumnType, MetricSample, SampleValue,
    TableSchema, SCRIPT_DATA_SCHEMA,
};
pub use script::{ScriptDefinition, ScriptList};
