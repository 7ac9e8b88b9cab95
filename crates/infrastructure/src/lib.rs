//! # HostStat Infrastructure
//!
//! 外部协作方的具体实现：SQLite持久化、基于 sysinfo 的主机计数器与采集源、
//! 结构化日志与自身指标。

pub mod counters;
pub mod database;
pub mod observability;
pub mod sources;

pub use counters::SysinfoCounterProvider;
pub use database::*;
pub use observability::*;
pub use sources::{build_sources, HostMetricSource, Sampler};
