pub mod manager;
pub mod sqlite_metric_store;
pub mod sqlite_script_repository;

pub use manager::DatabaseManager;
pub use sqlite_metric_store::SqliteMetricStore;
pub use sqlite_script_repository::SqliteScriptRepository;
