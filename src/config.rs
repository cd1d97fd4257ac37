use std::num::{NonZeroU64, NonZeroUsize};
use std::str::FromStr;

use crate::error::ConfigError;

const DEFAULT_BATCH_SIZE: NonZeroUsize = match NonZeroUsize::new(4) {
    Some(size) => size,
    None => unreachable!(),
};

const DEFAULT_LLM_TIMEOUT_SECS: NonZeroU64 = match NonZeroU64::new(60) {
    Some(secs) => secs,
    None => unreachable!(),
};

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// HTTP 监听地址
    pub bind_addr: String,
    /// 每批同时处理的图片数量
    pub batch_size: NonZeroUsize,
    /// 单次请求允许的最大图片数量（None 表示不限制）
    pub max_images_per_request: Option<usize>,
    /// 请求体大小上限（字节）
    pub body_limit_bytes: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 单次 LLM 调用超时（秒）
    pub llm_timeout_secs: NonZeroU64,
    /// LLM 调用失败后的最大重试次数
    pub llm_max_retries: u32,
    /// 首次重试前的等待时间（毫秒），之后每次翻倍
    pub llm_retry_backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_images_per_request: Some(20),
            body_limit_bytes: 10 * 1024 * 1024,
            verbose_logging: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            llm_timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
            llm_max_retries: 2,
            llm_retry_backoff_ms: 500,
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源加载配置
    ///
    /// 未设置的键使用默认值；设置了但无法解析的键返回错误。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        let llm_api_key = lookup("OPENAI_API_KEY")
            .or_else(|| lookup("LLM_API_KEY"))
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::EnvVarNotFound {
                var_name: "OPENAI_API_KEY".to_string(),
            })?;

        let batch_size = match lookup("BATCH_SIZE") {
            Some(raw) => raw
                .trim()
                .parse::<NonZeroUsize>()
                .map_err(|_| parse_failed("BATCH_SIZE", &raw, "正整数"))?,
            None => default.batch_size,
        };

        // 0 表示不限制
        let max_images_per_request = match lookup("MAX_IMAGES_PER_REQUEST") {
            Some(raw) => match parse_var::<usize>("MAX_IMAGES_PER_REQUEST", &raw, "非负整数")? {
                0 => None,
                max => Some(max),
            },
            None => default.max_images_per_request,
        };

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(default.bind_addr),
            batch_size,
            max_images_per_request,
            body_limit_bytes: parse_or(
                &lookup,
                "BODY_LIMIT_BYTES",
                default.body_limit_bytes,
                "非负整数",
            )?,
            verbose_logging: parse_or(
                &lookup,
                "VERBOSE_LOGGING",
                default.verbose_logging,
                "布尔值",
            )?,
            llm_api_key,
            llm_api_base_url: lookup("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: lookup("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            llm_timeout_secs: parse_or(
                &lookup,
                "LLM_TIMEOUT_SECS",
                default.llm_timeout_secs,
                "正整数",
            )?,
            llm_max_retries: parse_or(
                &lookup,
                "LLM_MAX_RETRIES",
                default.llm_max_retries,
                "非负整数",
            )?,
            llm_retry_backoff_ms: parse_or(
                &lookup,
                "LLM_RETRY_BACKOFF_MS",
                default.llm_retry_backoff_ms,
                "非负整数",
            )?,
        })
    }
}

fn parse_or<T, F>(
    lookup: &F,
    var_name: &str,
    default: T,
    expected_type: &str,
) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var_name) {
        Some(raw) => parse_var(var_name, &raw, expected_type),
        None => Ok(default),
    }
}

fn parse_var<T: FromStr>(var_name: &str, raw: &str, expected_type: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| parse_failed(var_name, raw, expected_type))
}

fn parse_failed(var_name: &str, value: &str, expected_type: &str) -> ConfigError {
    ConfigError::EnvVarParseFailed {
        var_name: var_name.to_string(),
        value: value.to_string(),
        expected_type: expected_type.to_string(),
    }
}
