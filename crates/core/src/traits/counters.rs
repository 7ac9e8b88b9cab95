use crate::errors::HostStatResult;

/// 已打开的主机计数器
///
/// 采样在阻塞线程中进行，实现方可以持有需要刷新的系统句柄。
pub trait CounterHandle: Send {
    fn path(&self) -> &str;

    /// 读取当前值，计数器暂时不可读时返回 `None`
    fn sample(&mut self) -> Option<f64>;
}

/// 计数器工厂，按路径打开计数器
pub trait CounterProvider: Send + Sync {
    /// 路径无法解析或对象/计数器不受支持时返回错误
    fn open(&self, path: &str) -> HostStatResult<Box<dyn CounterHandle>>;
}
