pub mod pool;

pub use pool::{current_worker, PoolTask, TargetWorker, WorkerPool, RESERVED_WORKER};
