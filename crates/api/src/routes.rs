use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use hoststat_core::config::AppConfig;
use hoststat_dispatcher::CollectionScheduler;
use hoststat_script::ScriptEngine;
use std::sync::Arc;

use crate::handlers::{
    health::health_check,
    providers::{aggregate_provider, recent_provider_data},
    scripts::{delete_script, list_scripts, patch_script, save_script},
    system::{get_config, get_info},
};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ScriptEngine>,
    pub scheduler: Arc<CollectionScheduler>,
    pub config: Arc<AppConfig>,
    pub hostname: String,
}

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/info", get(get_info))
        .route("/api/config", get(get_config))
        // 脚本管理
        .route("/api/script", get(list_scripts))
        .route("/api/script/save", post(save_script))
        .route("/api/script/patch", patch(patch_script))
        .route("/api/script/delete/{name}", delete(delete_script))
        // 采集数据
        .route("/api/providers/{limit}", get(recent_provider_data))
        .route("/api/provider/aggregate", get(aggregate_provider))
        .with_state(state)
}
