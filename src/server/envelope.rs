//! tRPC 响应信封
//!
//! - 单次调用: `{"result": {"data": ...}}` 或 `{"error": {...}}`
//! - 批量调用（`?batch=1`）: 按调用顺序排列的信封数组

use axum::http::StatusCode;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct TrpcData<T> {
    pub data: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrpcError {
    pub message: String,
    pub code: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum TrpcEnvelope<T> {
    Result { result: TrpcData<T> },
    Error { error: TrpcError },
}

impl<T> TrpcEnvelope<T> {
    pub fn data(data: T) -> Self {
        TrpcEnvelope::Result {
            result: TrpcData { data },
        }
    }

    pub fn error(error: TrpcError) -> Self {
        TrpcEnvelope::Error { error }
    }
}

/// 批量响应的 HTTP 状态码
///
/// 所有调用状态相同时沿用该状态，否则为 207。
pub fn batch_status(statuses: &[StatusCode]) -> StatusCode {
    match statuses.split_first() {
        Some((first, rest)) if rest.iter().all(|status| status == first) => *first,
        Some(_) => StatusCode::MULTI_STATUS,
        None => StatusCode::OK,
    }
}
