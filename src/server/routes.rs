use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{self, SharedProcedures};

/// 创建应用路由
///
/// # 参数
/// - `procedures`: 过程集合
/// - `body_limit`: 请求体大小上限（字节）
pub fn routes(procedures: SharedProcedures, body_limit: usize) -> Router {
    // 单次调用为过程名，批量调用为逗号分隔的过程名列表
    let procedure_routes =
        Router::new().route("/{procedures}", get(handlers::query).post(handlers::mutation));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/trpc", procedure_routes)
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(procedures)
}
