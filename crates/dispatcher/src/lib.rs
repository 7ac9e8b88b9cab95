//! # HostStat Dispatcher
//!
//! 采集调度器：按固定间隔推进周期编号，把采集源与脚本引擎的工作投递到线程池。

pub mod scheduler;

pub use scheduler::{CollectionScheduler, SchedulerState, TickReport};
