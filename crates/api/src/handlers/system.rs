use axum::extract::State;
use hoststat_core::models::CollectorInfo;
use serde::Serialize;

use crate::{error::ApiResult, response::success, routes::AppState};

/// 采集状态
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    #[serde(flatten)]
    pub collector: CollectorInfo,
    pub hostname: String,
    pub current_epoch: u64,
    pub registered_scripts: usize,
}

/// 获取采集状态
pub async fn get_info(
    State(state): State<AppState>,
) -> ApiResult<impl axum::response::IntoResponse> {
    Ok(success(InfoResponse {
        collector: state.scheduler.info(),
        hostname: state.hostname.clone(),
        current_epoch: state.scheduler.current_epoch().value(),
        registered_scripts: state.engine.registered_names().await.len(),
    }))
}

/// 获取生效的配置
pub async fn get_config(
    State(state): State<AppState>,
) -> ApiResult<impl axum::response::IntoResponse> {
    Ok(success(state.config.as_ref().clone()))
}
