//! # HostStat API
//!
//! 采集代理的REST接口，基于Axum构建。
//!
//! ## API 端点
//!
//! - `GET /api/health` - 存活检查
//! - `GET /api/info` - 采集状态 `{isActive, providerNames, hostname, currentEpoch}`
//! - `GET /api/config` - 生效的配置
//! - `GET /api/script` - 脚本列表 `{scripts: [...]}`
//! - `POST /api/script/save` - 新增脚本 `{name, sourceText, counterPath}`
//! - `PATCH /api/script/patch` - 按名称修改脚本
//! - `DELETE /api/script/delete/{name}` - 删除脚本
//! - `GET /api/providers/{limit}` - 每个采集源最近的样本
//! - `GET /api/provider/aggregate?provider=&column=` - 列聚合
//!
//! ## 响应格式
//!
//! ```json
//! {
//!   "success": true,
//!   "data": { "isActive": true, "providerNames": ["cpu", "memory"] },
//!   "message": null,
//!   "timestamp": "2024-01-01T00:00:00Z"
//! }
//! ```

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use axum::Router;
use hoststat_core::config::ApiConfig;
use tower::ServiceBuilder;

use middleware::{cors_layer, request_logging, trace_layer};
pub use routes::{create_routes, AppState};

/// 创建完整的API应用
pub fn create_app(state: AppState, api_config: &ApiConfig) -> Router {
    let router = create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(axum::middleware::from_fn(request_logging)),
    );

    if api_config.cors_enabled {
        router.layer(cors_layer())
    } else {
        router
    }
}
