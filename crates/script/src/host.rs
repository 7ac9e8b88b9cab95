use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use hoststat_core::traits::CounterHandle;

use crate::sandbox::ScriptHost;

/// 脚本单次执行中调用 `persist` 记录的值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersistedValue {
    pub value: f64,
    pub timestamp: i64,
}

/// 绑定到某个脚本计数器的宿主实现
///
/// `persist` 只在内存中缓冲，执行结束后由调用方取出并写入存储，
/// 脚本线程不会等待数据库。
pub struct BoundHost {
    counter: Arc<Mutex<Box<dyn CounterHandle>>>,
    persisted: Mutex<Vec<PersistedValue>>,
}

impl BoundHost {
    pub fn new(counter: Arc<Mutex<Box<dyn CounterHandle>>>) -> Self {
        Self {
            counter,
            persisted: Mutex::new(Vec::new()),
        }
    }

    /// 取出并清空缓冲的值
    pub fn take_persisted(&self) -> Vec<PersistedValue> {
        let mut persisted = self
            .persisted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *persisted)
    }
}

impl ScriptHost for BoundHost {
    fn persist(&self, value: f64) {
        self.persisted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PersistedValue {
                value,
                timestamp: Utc::now().timestamp(),
            });
    }

    fn counter_value(&self) -> f64 {
        let mut counter = self.counter.lock().unwrap_or_else(PoisonError::into_inner);
        counter
            .sample()
            .filter(|value| value.is_finite())
            .unwrap_or(0.0)
    }
}
