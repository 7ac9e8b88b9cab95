//! 采集代理配置
//!
//! 配置按运行组件划分为若干段，每段提供 `validate()`，由 [`AppConfig`] 统一加载与校验。

pub mod models;


pub use models::*;
