//! # SnapConnect
//!
//! 截图分析后端：接收前端上传的截图，调用多模态 LLM 接口，
//! 返回分析文本、人物信息或汇总后的 markdown 晨报。
//!
//! ## 架构设计
//!
//! ### ① 客户端层（Clients）
//! - `clients/` - 持有上游连接，只暴露"聊天补全"能力
//! - `LlmClient` - 基于 async-openai，带超时与重试
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能对一张图片做什么"
//! - `InferenceAdapter` - 分析 / 人物提取 / 晨报生成
//!
//! ### ③ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 分批、批内并发、按序汇总
//!
//! ### ④ 流程层（Workflow）
//! - `workflow/` - 每个对外过程的完整流程
//!
//! ### ⑤ 接口层（Server）
//! - `server/` - axum 路由，tRPC 兼容的请求 / 响应格式
//!
//! ## 模块结构

pub mod app;
pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod server;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use app::App;
pub use clients::{ChatBackend, ChatRequest, LlmClient};
pub use config::Config;
pub use error::{AnalysisError, AppResult, BatchError, ConfigError, LlmError, ProcedureError};
pub use models::{PersonRecord, NOT_FOUND};
pub use orchestrator::{BatchProcessor, ItemOutcome};
pub use services::InferenceAdapter;
pub use workflow::Procedures;
