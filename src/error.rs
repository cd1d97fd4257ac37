//! 错误类型
//!
//! 按层划分：
//! - `ConfigError` - 启动时的配置错误
//! - `LlmError` - 与上游 LLM 接口交互的详细错误（只在适配层内部可见）
//! - `AnalysisError` - 适配层对外暴露的粗粒度错误，不携带上游细节
//! - `BatchError` - 批处理编排错误
//! - `ProcedureError` - 对外过程（procedure）层错误，由 server 层映射为 HTTP 响应

use async_openai::error::OpenAIError;
use thiserror::Error;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 环境变量不存在
    #[error("环境变量 {var_name} 不存在")]
    EnvVarNotFound { var_name: String },
}

/// LLM 调用错误
///
/// 包含上游的诊断信息，只用于服务端日志。
#[derive(Debug, Error)]
pub enum LlmError {
    /// 构建请求失败
    #[error("构建 LLM 请求失败: {0}")]
    RequestBuild(#[source] OpenAIError),
    /// API 调用失败（网络错误或上游返回错误）
    #[error("LLM API 调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: OpenAIError,
    },
    /// 单次调用超时
    #[error("LLM API 调用超时 (模型: {model}, 超时: {timeout_secs} 秒)")]
    Timeout { model: String, timeout_secs: u64 },
    /// 返回内容无法按预期结构解析
    #[error("LLM 返回内容格式错误: {reason}")]
    MalformedResponse { reason: String },
}

impl LlmError {
    /// 是否值得再次尝试
    ///
    /// 超时和网络层错误可重试；上游返回的错误对象（如 400 请求无效）重试结果相同。
    /// 5xx / 429 已在 async-openai 内部按退避重试过。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::Timeout { .. }
                | LlmError::ApiCallFailed {
                    source: OpenAIError::Reqwest(_),
                    ..
                }
        )
    }
}

/// 适配层错误
///
/// 对调用方只暴露操作类别，上游细节在适配层记录日志后丢弃。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("Failed to analyze image")]
    Analysis,
    #[error("Failed to extract person from image")]
    Extraction,
    #[error("Failed to generate morning brief")]
    Brief,
}

/// 批处理错误
#[derive(Debug, Error)]
pub enum BatchError<E> {
    /// 输入数量超过上限，任何任务都不会被执行
    #[error("输入数量 {count} 超过上限 {max}")]
    TooManyItems { count: usize, max: usize },
    /// 某一项处理失败，整个调用失败
    #[error("第 {index} 项处理失败: {source}")]
    Item {
        index: usize,
        #[source]
        source: E,
    },
}

/// 过程层错误
#[derive(Debug, Error)]
pub enum ProcedureError {
    /// 图片数量超过上限
    #[error("Too many images: {count} (max {max})")]
    TooManyImages { count: usize, max: usize },
    /// 适配层失败
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl From<BatchError<AnalysisError>> for ProcedureError {
    fn from(err: BatchError<AnalysisError>) -> Self {
        match err {
            BatchError::TooManyItems { count, max } => ProcedureError::TooManyImages { count, max },
            BatchError::Item { source, .. } => ProcedureError::Analysis(source),
        }
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, ProcedureError>;

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::error::ApiError;

    #[test]
    fn test_batch_error_maps_to_procedure_error() {
        let err: ProcedureError = BatchError::Item {
            index: 3,
            source: AnalysisError::Extraction,
        }
        .into();
        assert!(matches!(err, ProcedureError::Analysis(AnalysisError::Extraction)));
        assert_eq!(err.to_string(), "Failed to extract person from image");

        let err: ProcedureError =
            BatchError::<AnalysisError>::TooManyItems { count: 21, max: 20 }.into();
        assert!(matches!(err, ProcedureError::TooManyImages { count: 21, max: 20 }));
    }

    #[test]
    fn test_llm_error_retryable() {
        let timeout = LlmError::Timeout {
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 60,
        };
        assert!(timeout.is_retryable());

        let invalid_request = LlmError::ApiCallFailed {
            model: "gpt-4o-mini".to_string(),
            source: OpenAIError::ApiError(ApiError {
                message: "Invalid image".to_string(),
                r#type: Some("invalid_request_error".to_string()),
                param: None,
                code: None,
            }),
        };
        assert!(!invalid_request.is_retryable());

        let malformed = LlmError::MalformedResponse {
            reason: "not json".to_string(),
        };
        assert!(!malformed.is_retryable());

        let build = LlmError::RequestBuild(OpenAIError::InvalidArgument("model".to_string()));
        assert!(!build.is_retryable());
    }

    #[test]
    fn test_config_error_message() {
        let err = ConfigError::EnvVarParseFailed {
            var_name: "BATCH_SIZE".to_string(),
            value: "abc".to_string(),
            expected_type: "正整数".to_string(),
        };
        assert!(err.to_string().contains("BATCH_SIZE"));
        assert!(err.to_string().contains("abc"));
    }
}
