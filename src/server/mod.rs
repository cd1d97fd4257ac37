//! HTTP 接口层
//!
//! 以 tRPC 兼容的信封格式暴露各个过程：
//! - 成功: `{"result": {"data": ...}}`
//! - 失败: `{"error": {"message": ..., "code": ...}}`
//! - 批量（`?batch=1`）: 上述信封组成的数组

pub mod envelope;
pub mod errors;
pub mod handlers;
pub mod routes;

pub use errors::ApiError;
pub use routes::routes;
