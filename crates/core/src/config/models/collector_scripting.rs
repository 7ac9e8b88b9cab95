use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 内置采集源名称
pub const KNOWN_SOURCES: [&str; 5] = ["cpu", "memory", "storage", "network", "process"];

/// 周期采集配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub enabled: bool,
    /// 采集间隔（毫秒）
    pub metric_fetch_interval_ms: u64,
    /// 采集间隔下限（毫秒）
    pub min_fetch_interval_ms: u64,
    pub sources: Vec<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            metric_fetch_interval_ms: 10_000,
            min_fetch_interval_ms: 1_000,
            sources: KNOWN_SOURCES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl CollectorConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min_fetch_interval_ms == 0 {
            return Err(anyhow::anyhow!("采集间隔下限必须大于0"));
        }

        for source in &self.sources {
            if !KNOWN_SOURCES.contains(&source.as_str()) {
                return Err(anyhow::anyhow!(
                    "无效的采集源: {}，支持的采集源: {:?}",
                    source,
                    KNOWN_SOURCES
                ));
            }
        }

        Ok(())
    }

    /// 钳制到下限之后的实际采集间隔
    pub fn effective_interval(&self) -> Duration {
        Duration::from_millis(self.metric_fetch_interval_ms.max(self.min_fetch_interval_ms))
    }
}

/// 脚本引擎配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptingConfig {
    pub enabled: bool,
    /// 单次执行超时（毫秒），未设置时不限制
    pub execution_timeout_ms: Option<u64>,
    /// 单次执行的最大操作数，未设置时不限制
    pub max_operations: Option<u64>,
}

impl Default for ScriptingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            execution_timeout_ms: None,
            max_operations: None,
        }
    }
}

impl ScriptingConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.execution_timeout_ms == Some(0) {
            return Err(anyhow::anyhow!("脚本执行超时必须大于0"));
        }

        if self.max_operations == Some(0) {
            return Err(anyhow::anyhow!("脚本最大操作数必须大于0"));
        }

        Ok(())
    }

    pub fn execution_timeout(&self) -> Option<Duration> {
        self.execution_timeout_ms.map(Duration::from_millis)
    }
}
