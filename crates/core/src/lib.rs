//! # HostStat Core
//!
//! 采集代理的共享核心：统一错误类型、配置模型、领域模型与服务抽象。

pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

pub use config::*;
pub use errors::*;
pub use models::*;
pub use traits::*;
