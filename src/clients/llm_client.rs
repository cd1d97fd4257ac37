//! LLM API 客户端
//!
//! 封装所有与 OpenAI 兼容接口的交互。
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 每次调用有独立超时，失败后按指数退避重试
//!
//! ## 重试分工
//! - 上游返回 5xx / 429：由 async-openai 内置的 `backoff` 在单次调用内重试
//! - 超时、网络层错误：由 `LlmClient::complete` 重试，最多 `max_retries` 次
//! - 其他上游错误（如 400 请求无效）：不重试

use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::LlmError;

/// 单次重试等待的上限
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// 一次聊天补全请求
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// 系统消息（可选）
    pub system_message: Option<String>,
    /// 用户消息文本
    pub user_message: String,
    /// 随用户消息附带的图片 URL（可选）
    pub image_url: Option<String>,
    /// 最大输出 token 数
    pub max_tokens: u32,
}

/// 聊天补全能力
///
/// 适配层只依赖这个 trait，测试时可替换为假实现。
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// 发送请求，返回第一个候选的文本内容（上游未返回内容时为 None）
    async fn complete(&self, request: ChatRequest) -> Result<Option<String>, LlmError>;
}

/// LLM 客户端
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    model_name: String,
    timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
}

impl LlmClient {
    /// 创建新的 LLM 客户端
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        let timeout = Duration::from_secs(config.llm_timeout_secs.get());
        let retry_backoff = Duration::from_millis(config.llm_retry_backoff_ms);

        // 5xx / 429 的内置重试不能超出单次调用的超时
        let status_backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(retry_delay(retry_backoff, 0).max(Duration::from_millis(1)))
            .with_max_interval(MAX_RETRY_BACKOFF)
            .with_max_elapsed_time(Some(timeout))
            .build();

        Self {
            client: Client::with_config(openai_config).with_backoff(status_backoff),
            model_name: config.llm_model_name.clone(),
            timeout,
            max_retries: config.llm_max_retries,
            retry_backoff,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// 构建请求体
    fn build_request(
        &self,
        request: &ChatRequest,
    ) -> Result<CreateChatCompletionRequest, OpenAIError> {
        let mut messages = Vec::new();

        // 添加系统消息（如果提供）
        if let Some(sys_msg) = &request.system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg.as_str())
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        // 构建用户消息内容（支持图片）
        let user_msg = match &request.image_url {
            Some(url) => {
                let content_parts = vec![
                    ChatCompletionRequestUserMessageContentPart::Text(
                        ChatCompletionRequestMessageContentPartText {
                            text: request.user_message.clone(),
                        },
                    ),
                    ChatCompletionRequestUserMessageContentPart::ImageUrl(
                        ChatCompletionRequestMessageContentPartImage {
                            image_url: ImageUrl {
                                url: url.clone(),
                                detail: Some(ImageDetail::Auto),
                            },
                        },
                    ),
                ];

                ChatCompletionRequestUserMessageArgs::default()
                    .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
                    .build()?
            }
            None => ChatCompletionRequestUserMessageArgs::default()
                .content(request.user_message.as_str())
                .build()?,
        };

        messages.push(ChatCompletionRequestMessage::User(user_msg));

        CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .max_tokens(request.max_tokens)
            .build()
    }

    /// 单次调用（带超时）
    async fn send_once(
        &self,
        request: CreateChatCompletionRequest,
    ) -> Result<Option<String>, LlmError> {
        let chat = self.client.chat();
        let call = chat.create(request);

        let response = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return Err(LlmError::ApiCallFailed {
                    model: self.model_name.clone(),
                    source: e,
                })
            }
            Err(_) => {
                return Err(LlmError::Timeout {
                    model: self.model_name.clone(),
                    timeout_secs: self.timeout.as_secs(),
                })
            }
        };

        // 提取响应内容
        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content))
    }
}

#[async_trait]
impl ChatBackend for LlmClient {
    async fn complete(&self, request: ChatRequest) -> Result<Option<String>, LlmError> {
        debug!(
            "调用 LLM API，模型: {}，用户消息长度: {} 字符，图片: {}",
            self.model_name,
            request.user_message.len(),
            request.image_url.is_some()
        );

        let body = self.build_request(&request).map_err(LlmError::RequestBuild)?;

        // 重试逻辑
        let mut attempt = 0;
        loop {
            match self.send_once(body.clone()).await {
                Ok(content) => {
                    debug!("LLM API 调用成功");
                    return Ok(content);
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let wait = retry_delay(self.retry_backoff, attempt);
                    warn!(
                        "LLM API 调用失败 (尝试 {}/{}): {}，{} 毫秒后重试...",
                        attempt + 1,
                        self.max_retries.saturating_add(1),
                        e,
                        wait.as_millis()
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!("LLM API 调用失败 (共尝试 {} 次): {}", attempt + 1, e);
                    return Err(e);
                }
            }
        }
    }
}

/// 第 `attempt` 次重试前的等待时间：`base * 2^attempt`，不超过 `MAX_RETRY_BACKOFF`
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.checked_mul(2u32.saturating_pow(attempt))
        .map_or(MAX_RETRY_BACKOFF, |wait| wait.min(MAX_RETRY_BACKOFF))
}
