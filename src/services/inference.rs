//! 图片推理服务 - 业务能力层
//!
//! 只负责"单张图片 → 结果"的能力，不关心批处理：
//! - `analyze_image` - 自由文本分析
//! - `extract_person` - 结构化人物信息提取
//! - `generate_brief` - 由多条分析生成 markdown 晨报
//!
//! 上游的任何错误（网络、超时、格式）在这里记录日志，
//! 然后折叠成 `AnalysisError`，不向调用方泄露上游细节。

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, error};

use crate::clients::{ChatBackend, ChatRequest};
use crate::error::{AnalysisError, LlmError};
use crate::models::{ImageInput, PersonRecord};
use crate::utils::logging::truncate_text;

const ANALYSIS_PROMPT: &str = "Analyze this image and provide key observations about: \
1. Main subjects/objects 2. Activities/actions 3. Setting/environment \
4. Notable details or unusual elements";

const EXTRACTION_PROMPT: &str = "This is a screenshot from a professional context \
(for example a LinkedIn profile, a video call, an email or a chat). \
Extract the person shown and return ONLY a JSON object with these keys: \
\"name\", \"company\", \"role\", \"timestamp\". \
Use null for any value that is not visible in the image. Do not add any other text.";

const BRIEF_SYSTEM_PROMPT: &str = "You are a professional brief writer. \
Create concise, well-structured morning briefs in markdown format.";

const BRIEF_PROMPT: &str = "Based on the following image analyses, create a morning brief \
in markdown format. Include relevant sections and highlights:";

const ANALYSIS_MAX_TOKENS: u32 = 1000;
const EXTRACTION_MAX_TOKENS: u32 = 500;
const BRIEF_MAX_TOKENS: u32 = 2000;

/// ```json ... ``` 代码块
static CODE_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*```[a-zA-Z]*\s*\n?(.*?)\n?\s*```\s*$").unwrap());

/// 图片推理服务
///
/// 在进程启动时构建一次，按引用传给各个过程。
#[derive(Clone)]
pub struct InferenceAdapter {
    backend: Arc<dyn ChatBackend>,
}

impl InferenceAdapter {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    /// 自由文本分析
    ///
    /// 原样返回模型输出；模型没有返回内容时返回空字符串。
    pub async fn analyze_image(&self, image: &str) -> Result<String, AnalysisError> {
        let image = ImageInput::new(image);
        debug!("分析图片: {}", image);

        let request = ChatRequest {
            system_message: None,
            user_message: ANALYSIS_PROMPT.to_string(),
            image_url: Some(image.to_image_url()),
            max_tokens: ANALYSIS_MAX_TOKENS,
        };

        match self.backend.complete(request).await {
            Ok(content) => Ok(content.unwrap_or_default()),
            Err(e) => {
                error!("❌ 图片分析失败: {}", e);
                Err(AnalysisError::Analysis)
            }
        }
    }

    /// 结构化人物信息提取
    pub async fn extract_person(&self, image: &str) -> Result<PersonRecord, AnalysisError> {
        let input = ImageInput::new(image);
        debug!("提取人物信息: {}", input);

        let request = ChatRequest {
            system_message: None,
            user_message: EXTRACTION_PROMPT.to_string(),
            image_url: Some(input.to_image_url()),
            max_tokens: EXTRACTION_MAX_TOKENS,
        };

        let result = match self.backend.complete(request).await {
            Ok(content) => {
                parse_person_response(content.as_deref().unwrap_or_default(), input.as_str())
            }
            Err(e) => Err(e),
        };

        result.map_err(|e| {
            error!("❌ 人物信息提取失败: {}", e);
            AnalysisError::Extraction
        })
    }

    /// 根据多条图片分析生成 markdown 晨报
    ///
    /// 没有任何分析时直接返回空字符串，不调用上游。
    pub async fn generate_brief(&self, analyses: &[String]) -> Result<String, AnalysisError> {
        if analyses.is_empty() {
            debug!("没有图片分析结果，跳过晨报生成");
            return Ok(String::new());
        }

        let request = ChatRequest {
            system_message: Some(BRIEF_SYSTEM_PROMPT.to_string()),
            user_message: format!("{}\n\n{}", BRIEF_PROMPT, analyses.join("\n\n")),
            image_url: None,
            max_tokens: BRIEF_MAX_TOKENS,
        };

        match self.backend.complete(request).await {
            Ok(content) => Ok(content.unwrap_or_default()),
            Err(e) => {
                error!("❌ 晨报生成失败: {}", e);
                Err(AnalysisError::Brief)
            }
        }
    }
}

/// 解析人物提取的模型响应
///
/// 两步解码：先去掉可能的 markdown 代码块再解析 JSON，
/// 结果必须是 JSON 对象，否则返回 `MalformedResponse`。
fn parse_person_response(content: &str, image: &str) -> Result<PersonRecord, LlmError> {
    let body = strip_code_fence(content);

    let value: Value = serde_json::from_str(body).map_err(|e| LlmError::MalformedResponse {
        reason: format!("{} (响应: {})", e, truncate_text(content, 80)),
    })?;

    match value {
        Value::Object(object) => Ok(PersonRecord::from_json_object(&object, image)),
        other => Err(LlmError::MalformedResponse {
            reason: format!("期望 JSON 对象，实际为: {}", truncate_text(&other.to_string(), 80)),
        }),
    }
}

fn strip_code_fence(content: &str) -> &str {
    CODE_FENCE_RE
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(content)
        .trim()
}
