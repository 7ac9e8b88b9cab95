pub mod api_observability;
pub mod app_config;
pub mod collector_scripting;
pub mod database;
pub mod worker_pool;

// Re-export main types for easier imports
pub use api_observability::{ApiConfig, ObservabilityConfig};
pub use app_config::AppConfig;
pub use collector_scripting::{CollectorConfig, ScriptingConfig, KNOWN_SOURCES};
pub use database::DatabaseConfig;
pub use worker_pool::WorkerPoolConfig;
