//! Metrics collector for the host telemetry agent
//!
//! Records the agent's own health through the `metrics` facade. Without an
//! installed recorder every call is a no-op.

use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};

/// Metrics collector for the host telemetry agent
#[derive(Clone)]
pub struct MetricsCollector {
    // Collection loop metrics
    ticks_total: Counter,
    current_epoch: Gauge,
    tick_dispatch_duration: Histogram,

    // Script metrics
    script_runs_total: Counter,
    script_failures_total: Counter,
    script_execution_duration: Histogram,
    registered_scripts: Gauge,

    // Worker pool metrics
    pool_rejections_total: Counter,
    pool_task_panics_total: Counter,
    pool_discarded_tasks_total: Counter,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            ticks_total: counter!("hoststat_ticks_total"),
            current_epoch: gauge!("hoststat_current_epoch"),
            tick_dispatch_duration: histogram!("hoststat_tick_dispatch_duration_seconds"),
            script_runs_total: counter!("hoststat_script_runs_total"),
            script_failures_total: counter!("hoststat_script_failures_total"),
            script_execution_duration: histogram!("hoststat_script_execution_duration_seconds"),
            registered_scripts: gauge!("hoststat_registered_scripts"),
            pool_rejections_total: counter!("hoststat_pool_rejections_total"),
            pool_task_panics_total: counter!("hoststat_pool_task_panics_total"),
            pool_discarded_tasks_total: counter!("hoststat_pool_discarded_tasks_total"),
        }
    }

    // Collection loop metrics

    pub fn record_tick(&self, epoch: u64, dispatch_seconds: f64) {
        self.ticks_total.increment(1);
        self.current_epoch.set(epoch as f64);
        self.tick_dispatch_duration.record(dispatch_seconds);
    }

    /// Record a metric source failure, labelled by source
    pub fn record_source_failure(&self, source: &str) {
        counter!("hoststat_source_failures_total", "source" => source.to_string()).increment(1);
    }

    // Script metrics

    pub fn record_script_run(&self, duration_seconds: f64) {
        self.script_runs_total.increment(1);
        self.script_execution_duration.record(duration_seconds);
    }

    pub fn record_script_failure(&self, error_kind: &str) {
        self.script_failures_total.increment(1);
        counter!("hoststat_script_failures_by_kind_total", "kind" => error_kind.to_string())
            .increment(1);
    }

    pub fn update_registered_scripts(&self, count: usize) {
        self.registered_scripts.set(count as f64);
    }

    // Worker pool metrics

    pub fn record_pool_rejection(&self) {
        self.pool_rejections_total.increment(1);
    }

    pub fn record_task_panic(&self) {
        self.pool_task_panics_total.increment(1);
    }

    pub fn record_discarded_tasks(&self, count: usize) {
        self.pool_discarded_tasks_total.increment(count as u64);
    }
}
