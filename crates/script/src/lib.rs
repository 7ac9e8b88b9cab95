//! # HostStat Script
//!
//! 用户脚本引擎：脚本以 Rhai 编写，每个采集周期在全新的沙箱上下文中执行一次，
//! 通过 `persist(value)` 写入 `script_data` 表，通过 `getCounterValue()` 读取绑定的主机计数器。

pub mod engine;
pub mod host;
pub mod runtime;
pub mod sandbox;

pub use engine::ScriptEngine;
pub use host::{BoundHost, PersistedValue};
pub use runtime::ScriptRuntime;
pub use sandbox::{check_syntax, ContextGauge, SandboxLimits, ScriptContext, ScriptHost, ENTRY_POINT};
