use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hoststat_core::HostStatError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    HostStat(#[from] HostStatError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn classify(&self) -> (StatusCode, &'static str, Vec<String>) {
        match self {
            ApiError::HostStat(HostStatError::ScriptAlreadyExists { .. }) => (
                StatusCode::CONFLICT,
                "SCRIPT_ALREADY_EXISTS",
                vec!["使用 PATCH /api/script/patch 修改已有脚本".to_string()],
            ),
            ApiError::HostStat(HostStatError::ScriptNotFound { .. }) => (
                StatusCode::NOT_FOUND,
                "SCRIPT_NOT_FOUND",
                vec!["使用 GET /api/script 查看所有脚本".to_string()],
            ),
            ApiError::HostStat(HostStatError::ProviderNotFound { .. }) => (
                StatusCode::NOT_FOUND,
                "PROVIDER_NOT_FOUND",
                vec!["使用 GET /api/info 查看可用的采集源".to_string()],
            ),
            ApiError::HostStat(HostStatError::ScriptCompile { .. }) => (
                StatusCode::BAD_REQUEST,
                "SCRIPT_COMPILE_ERROR",
                vec!["脚本需定义无参函数 execute()".to_string()],
            ),
            ApiError::HostStat(e) if e.is_client_error() => {
                (StatusCode::BAD_REQUEST, "INVALID_REQUEST", Vec::new())
            }
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", Vec::new()),
            ApiError::HostStat(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                vec!["系统遇到内部错误，请稍后重试".to_string()],
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, suggestions) = self.classify();

        if status.is_server_error() {
            tracing::error!("请求处理失败: {}", self);
        }

        let body = Json(json!({
            "success": false,
            "data": null,
            "message": self.to_string(),
            "error": {
                "type": error_type,
                "code": status.as_u16(),
                "suggestions": suggestions,
            },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(error: HostStatError) -> StatusCode {
        ApiError::from(error).into_response().status()
    }

    #[test]
    fn test_registry_errors_map_to_client_statuses() {
        assert_eq!(
            status_of(HostStatError::ScriptAlreadyExists {
                name: "a".to_string()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(HostStatError::ScriptNotFound {
                name: "a".to_string()
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(HostStatError::ProviderNotFound {
                name: "gpu".to_string()
            }),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_invalid_input_maps_to_bad_request() {
        assert_eq!(
            status_of(HostStatError::InvalidScript("empty".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(HostStatError::ScriptCompile {
                name: "a".to_string(),
                message: "unexpected".to_string()
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(HostStatError::InvalidColumn {
                table: "cpu_metrics".to_string(),
                column: "nope".to_string()
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::BadRequest("limit".to_string())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_other_errors_map_to_internal() {
        assert_eq!(
            status_of(HostStatError::Internal("boom".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status_of(HostStatError::PoolStopped), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
