use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::warn;

use crate::error::ProcedureError;
use crate::server::envelope::{TrpcEnvelope, TrpcError};

/// 接口错误
///
/// 统一转换为 tRPC 风格的错误响应
#[derive(Debug)]
pub enum ApiError {
    /// 请求不符合过程声明的输入结构
    BadRequest(String),
    /// 请求体超过大小上限
    PayloadTooLarge,
    /// 未知过程
    NotFound(String),
    /// mutation 过程不接受 GET
    MethodNotSupported(String),
    /// 过程执行失败
    Procedure(ProcedureError),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::MethodNotSupported(_) => {
                (StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_SUPPORTED")
            }
            ApiError::Procedure(ProcedureError::TooManyImages { .. }) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST")
            }
            ApiError::Procedure(ProcedureError::Analysis(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR")
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status_and_code().0
    }

    fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::PayloadTooLarge => "Request body too large".to_string(),
            ApiError::NotFound(path) => format!("No procedure found on path \"{}\"", path),
            ApiError::MethodNotSupported(path) => {
                format!("Unsupported GET-request to mutation procedure at path \"{}\"", path)
            }
            ApiError::Procedure(e) => e.to_string(),
        }
    }

    /// 转换为信封中的错误对象，服务端错误同时记录日志
    pub fn to_trpc(&self) -> TrpcError {
        let (status, code) = self.status_and_code();
        let message = self.message();

        if status.is_server_error() {
            warn!("请求失败 ({}): {}", code, message);
        }

        TrpcError { message, code }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(TrpcEnvelope::<()>::error(self.to_trpc()));
        (self.status(), body).into_response()
    }
}

impl From<ProcedureError> for ApiError {
    fn from(err: ProcedureError) -> Self {
        ApiError::Procedure(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("Invalid input: {}", err))
    }
}
