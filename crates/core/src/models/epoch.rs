use serde::{Deserialize, Serialize};
use std::fmt;

/// 采集周期编号
///
/// 进程内单调递增，从0开始，进程重启后归零。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epoch(pub u64);

impl Epoch {
    pub fn value(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Epoch(self.0 + 1)
    }

    /// SQLite只支持有符号整数
    pub fn as_i64(self) -> i64 {
        self.0 as i64
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Epoch {
    fn from(value: u64) -> Self {
        Epoch(value)
    }
}
