//! Observability module
//!
//! This module provides the agent's self-observability:
//! - Metrics collection via the `metrics` facade
//! - Structured event logging via `tracing`

pub mod metrics_collector;
pub mod structured_logger;

// Re-export main types for convenience
pub use metrics_collector::MetricsCollector;
pub use structured_logger::StructuredLogger;
