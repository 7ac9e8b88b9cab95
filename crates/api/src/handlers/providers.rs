use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use serde::Deserialize;

use crate::{
    error::{ApiError, ApiResult},
    response::success,
    routes::AppState,
};

/// 单个采集源最多返回的行数
pub const MAX_PROVIDER_ROWS: u32 = 1000;

/// 聚合查询参数
#[derive(Debug, Deserialize)]
pub struct AggregateQuery {
    pub provider: String,
    pub column: String,
}

/// 获取每个采集源最近的样本
pub async fn recent_provider_data(
    State(state): State<AppState>,
    Path(limit): Path<u32>,
) -> ApiResult<impl axum::response::IntoResponse> {
    if limit == 0 || limit > MAX_PROVIDER_ROWS {
        return Err(ApiError::BadRequest(format!(
            "limit 必须在 1 到 {MAX_PROVIDER_ROWS} 之间"
        )));
    }

    let mut data = BTreeMap::new();
    for source in state.scheduler.sources() {
        data.insert(source.name().to_string(), source.data_as_json(limit).await?);
    }
    Ok(success(data))
}

/// 对某个采集源的一列做聚合
pub async fn aggregate_provider(
    State(state): State<AppState>,
    Query(query): Query<AggregateQuery>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let source = state.scheduler.find_source(&query.provider)?;
    Ok(success(source.aggregate_as_json(&query.column).await?))
}
