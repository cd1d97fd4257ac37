use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::clients::LlmClient;
use crate::config::Config;
use crate::orchestrator::BatchProcessor;
use crate::server;
use crate::services::InferenceAdapter;
use crate::utils::logging::log_startup;
use crate::workflow::Procedures;

/// 应用主结构
///
/// 唯一持有上游客户端的地方；客户端只在启动时构建一次。
pub struct App {
    config: Config,
    procedures: Arc<Procedures>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let client = Arc::new(LlmClient::new(&config));
        info!("✓ LLM 客户端已创建 (模型: {})", client.model_name());

        let procedures = Procedures::new(
            InferenceAdapter::new(client),
            BatchProcessor::from_config(&config),
        );

        Ok(Self {
            config,
            procedures: Arc::new(procedures),
        })
    }

    /// 构建路由
    pub fn router(&self) -> Router {
        server::routes(self.procedures.clone(), self.config.body_limit_bytes)
    }

    /// 运行应用主逻辑，直到收到 Ctrl+C
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .with_context(|| format!("无法监听地址 {}", self.config.bind_addr))?;
        info!("🌐 正在监听 {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP 服务异常退出")?;

        info!("👋 服务已停止");
        Ok(())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // 无法安装信号处理时一直运行
        std::future::pending::<()>().await;
    }
    info!("收到退出信号，正在关闭...");
}
