//! 过程处理函数
//!
//! 兼容 tRPC HTTP 协议：
//! - query 类过程（hello / analyzeImage）支持 `GET ?input=<json>`，也接受 POST
//! - mutation 类过程（extractPeople / generateMorningBrief）只接受 POST
//! - `?batch=1` 时路径为逗号分隔的过程名，输入为 `{"0": ..., "1": ...}`，
//!   各调用并发执行，响应为按顺序排列的信封数组

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use futures::future::join_all;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::models::ProcedureOutput;
use crate::server::envelope::{batch_status, TrpcEnvelope};
use crate::server::errors::ApiError;
use crate::workflow::Procedures;

pub type SharedProcedures = Arc<Procedures>;

/// 请求方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallMethod {
    Get,
    Post,
}

/// 查询参数
#[derive(Debug, Default, Deserialize)]
pub struct TrpcParams {
    pub batch: Option<String>,
    pub input: Option<String>,
}

impl TrpcParams {
    fn is_batch(&self) -> bool {
        matches!(self.batch.as_deref(), Some("1") | Some("true"))
    }
}

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// GET /api/trpc/{procedures}
pub async fn query(
    State(procedures): State<SharedProcedures>,
    Path(path): Path<String>,
    params: Result<Query<TrpcParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params?;
    let input = params
        .input
        .as_deref()
        .map(serde_json::from_str::<Value>)
        .transpose()?;

    Ok(respond(&procedures, CallMethod::Get, &path, params.is_batch(), input).await)
}

/// POST /api/trpc/{procedures}
pub async fn mutation(
    State(procedures): State<SharedProcedures>,
    Path(path): Path<String>,
    params: Result<Query<TrpcParams>, QueryRejection>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params?;
    let Json(body) = payload?;

    Ok(respond(&procedures, CallMethod::Post, &path, params.is_batch(), Some(body)).await)
}

pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().trim_start_matches("/api/trpc/").to_string())
}

async fn respond(
    procedures: &Procedures,
    method: CallMethod,
    path: &str,
    batch: bool,
    input: Option<Value>,
) -> Response {
    if !batch {
        return match call(procedures, method, path, input.unwrap_or(Value::Null)).await {
            Ok(output) => Json(TrpcEnvelope::data(output)).into_response(),
            Err(e) => e.into_response(),
        };
    }

    let mut inputs = match input {
        Some(Value::Object(inputs)) => inputs,
        None => Map::new(),
        Some(_) => {
            let message = "Batch input must be an object keyed by call index";
            return ApiError::BadRequest(message.to_string()).into_response();
        }
    };

    let names: Vec<&str> = path.split(',').collect();
    debug!("批量调用: {:?}", names);

    let calls = names.iter().enumerate().map(|(index, name)| {
        let input = inputs.remove(&index.to_string()).unwrap_or(Value::Null);
        call(procedures, method, name, input)
    });
    let results = join_all(calls).await;

    let statuses: Vec<_> = results
        .iter()
        .map(|result| match result {
            Ok(_) => StatusCode::OK,
            Err(e) => e.status(),
        })
        .collect();

    let envelopes: Vec<TrpcEnvelope<ProcedureOutput>> = results
        .into_iter()
        .map(|result| match result {
            Ok(output) => TrpcEnvelope::data(output),
            Err(e) => TrpcEnvelope::error(e.to_trpc()),
        })
        .collect();

    (batch_status(&statuses), Json(envelopes)).into_response()
}

/// 按过程名分发一次调用
async fn call(
    procedures: &Procedures,
    method: CallMethod,
    name: &str,
    input: Value,
) -> Result<ProcedureOutput, ApiError> {
    match (name, method) {
        ("hello", _) => Ok(ProcedureOutput::Echo(procedures.echo(decode(input)?))),
        ("analyzeImage", _) => {
            let analysis = procedures.analyze_image(decode(input)?).await?;
            Ok(ProcedureOutput::Analysis(analysis))
        }
        ("extractPeople" | "generateMorningBrief", CallMethod::Get) => {
            Err(ApiError::MethodNotSupported(name.to_string()))
        }
        ("extractPeople", CallMethod::Post) => {
            let people = procedures.extract_people(decode(input)?).await?;
            Ok(ProcedureOutput::People(people))
        }
        ("generateMorningBrief", CallMethod::Post) => {
            let brief = procedures.generate_morning_brief(decode(input)?).await?;
            Ok(ProcedureOutput::Brief(brief))
        }
        _ => Err(ApiError::NotFound(name.to_string())),
    }
}

fn decode<T: DeserializeOwned>(input: Value) -> Result<T, ApiError> {
    Ok(serde_json::from_value(input)?)
}
