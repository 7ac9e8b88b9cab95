use axum::{
    extract::{Path, State},
    Json,
};
use hoststat_core::models::ScriptDefinition;

use crate::{
    error::ApiResult,
    response::{created, done, success},
    routes::AppState,
};

/// 获取脚本列表
pub async fn list_scripts(
    State(state): State<AppState>,
) -> ApiResult<impl axum::response::IntoResponse> {
    Ok(success(state.engine.list().await?))
}

/// 新增脚本
pub async fn save_script(
    State(state): State<AppState>,
    Json(definition): Json<ScriptDefinition>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let name = definition.name.clone();
    state.engine.save(definition).await?;
    Ok(created(format!("脚本 {name} 已保存")))
}

/// 按名称修改脚本
pub async fn patch_script(
    State(state): State<AppState>,
    Json(definition): Json<ScriptDefinition>,
) -> ApiResult<impl axum::response::IntoResponse> {
    state
        .engine
        .update(
            &definition.name,
            definition.source_text.clone(),
            definition.counter_path.clone(),
        )
        .await?;
    Ok(done(format!("脚本 {} 已更新", definition.name)))
}

/// 删除脚本
pub async fn delete_script(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<impl axum::response::IntoResponse> {
    state.engine.delete(&name).await?;
    Ok(done(format!("脚本 {name} 已删除")))
}
