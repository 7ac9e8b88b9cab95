//! Structured logging utilities
//!
//! Event helpers for the collection loop, metric sources and the script engine.
//! Every event carries an `event` field so log pipelines can filter on it.

use tracing::{debug, error, info, warn};

/// Structured logging utilities
pub struct StructuredLogger;

impl StructuredLogger {
    /// Log one dispatched collection tick
    pub fn log_tick_dispatched(
        epoch: u64,
        sources_submitted: usize,
        processors_submitted: usize,
        next_fetch_ms: u64,
    ) {
        info!(
            event = "tick_dispatched",
            tick.epoch = epoch,
            tick.sources = sources_submitted,
            tick.processors = processors_submitted,
            tick.next_fetch_ms = next_fetch_ms,
            "Metrics Fetched: {}. Next fetch in {} seconds",
            epoch,
            next_fetch_ms as f64 / 1000.0
        );
    }

    /// Log a metric source that could not be sampled or stored
    pub fn log_source_fetch_failed(source: &str, epoch: u64, error: &dyn std::error::Error) {
        warn!(
            event = "source_fetch_failed",
            source.name = source,
            tick.epoch = epoch,
            error.message = %error,
            "Metric source fetch failed"
        );
    }

    /// Log a successful script run
    pub fn log_script_executed(script: &str, epoch: u64, persisted: usize, duration_ms: u64) {
        debug!(
            event = "script_executed",
            script.name = script,
            tick.epoch = epoch,
            script.persisted = persisted,
            script.duration_ms = duration_ms,
            "Script executed"
        );
    }

    /// Log a failed script run
    pub fn log_script_failed(script: &str, epoch: u64, error: &dyn std::error::Error) {
        error!(
            event = "script_failed",
            script.name = script,
            tick.epoch = epoch,
            error.message = %error,
            "Script execution failed"
        );
    }

    /// Log a change to the script registry
    pub fn log_registry_change(action: &str, script: &str, counter_path: Option<&str>) {
        info!(
            event = "script_registry_change",
            registry.action = action,
            script.name = script,
            script.counter_path = counter_path,
            "Script registry changed"
        );
    }

    /// Log a task rejected by the worker pool
    pub fn log_pool_rejection(task: &str, error: &dyn std::error::Error) {
        warn!(
            event = "pool_rejection",
            pool.task = task,
            error.message = %error,
            "Worker pool rejected task"
        );
    }

    /// Log system error
    pub fn log_system_error(component: &str, operation: &str, error: &dyn std::error::Error) {
        error!(
            event = "system_error",
            error.component = component,
            error.operation = operation,
            error.message = %error,
            error.type = std::any::type_name_of_val(error),
            "System error occurred"
        );
    }
}
