use thiserror::Error;

/// 采集代理错误类型定义
#[derive(Debug, Error)]
pub enum HostStatError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("脚本已存在: {name}")]
    ScriptAlreadyExists { name: String },

    #[error("脚本未找到: {name}")]
    ScriptNotFound { name: String },

    #[error("无效的脚本定义: {0}")]
    InvalidScript(String),

    #[error("脚本编译失败: {name} - {message}")]
    ScriptCompile { name: String, message: String },

    #[error("脚本执行失败: {name} - {message}")]
    ScriptRuntime { name: String, message: String },

    #[error("脚本缺少入口函数 execute: {name}")]
    ScriptEntryPointMissing { name: String },

    #[error("脚本执行超时: {name}")]
    ScriptTimeout { name: String },

    #[error("无效的计数器路径: {path} - {message}")]
    InvalidCounterPath { path: String, message: String },

    #[error("计数器不可用: {path} - {message}")]
    CounterUnavailable { path: String, message: String },

    #[error("无效的Worker索引: {index}，线程池大小: {pool_size}")]
    InvalidWorkerIndex { index: usize, pool_size: usize },

    #[error("线程池已停止")]
    PoolStopped,

    #[error("采集源未找到: {name}")]
    ProviderNotFound { name: String },

    #[error("无效的列: {table}.{column}")]
    InvalidColumn { table: String, column: String },

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl HostStatError {
    /// 是否属于调用方输入错误
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            HostStatError::InvalidScript(_)
                | HostStatError::ScriptCompile { .. }
                | HostStatError::InvalidCounterPath { .. }
                | HostStatError::CounterUnavailable { .. }
                | HostStatError::InvalidColumn { .. }
        )
    }

    /// 数据库唯一约束冲突
    pub fn is_unique_violation(&self) -> bool {
        match self {
            HostStatError::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for HostStatError {
    fn from(err: serde_json::Error) -> Self {
        HostStatError::Serialization(err.to_string())
    }
}

/// 统一的Result类型
pub type HostStatResult<T> = std::result::Result<T, HostStatError>;
