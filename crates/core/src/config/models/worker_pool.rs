use serde::{Deserialize, Serialize};

/// 工作线程池配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Worker数量
    pub pool_size: usize,
    /// 不参与随机分配的保留Worker数量（从索引0开始）
    pub reserved_workers: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            pool_size: 2,
            reserved_workers: 1,
        }
    }
}

impl WorkerPoolConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.pool_size == 0 {
            return Err(anyhow::anyhow!("线程池大小必须大于0"));
        }

        if self.reserved_workers > self.pool_size {
            return Err(anyhow::anyhow!(
                "保留Worker数量({})不能大于线程池大小({})",
                self.reserved_workers,
                self.pool_size
            ));
        }

        Ok(())
    }
}
