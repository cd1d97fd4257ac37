//! 对外过程 - 流程层
//!
//! 定义每个远程可调用过程的完整流程：
//! - `echo` - 连通性验证
//! - `analyze_image` - 单张图片分析
//! - `extract_people` - 批量人物提取
//! - `generate_morning_brief` - 批量分析后生成晨报

use tracing::info;

use crate::error::AppResult;
use crate::models::{
    AnalyzeImageInput, EchoInput, EchoOutput, ImagesInput, MorningBriefOutput, PeopleOutput,
};
use crate::orchestrator::BatchProcessor;
use crate::services::InferenceAdapter;

/// 过程集合
///
/// - 不持有任何请求级状态
/// - 只依赖业务能力（services）和编排（orchestrator）
#[derive(Clone)]
pub struct Procedures {
    adapter: InferenceAdapter,
    batch: BatchProcessor,
}

impl Procedures {
    pub fn new(adapter: InferenceAdapter, batch: BatchProcessor) -> Self {
        Self { adapter, batch }
    }

    pub fn echo(&self, input: EchoInput) -> EchoOutput {
        EchoOutput {
            greeting: format!("hello {}", input.text),
        }
    }

    pub async fn analyze_image(&self, input: AnalyzeImageInput) -> AppResult<String> {
        Ok(self.adapter.analyze_image(&input.image).await?)
    }

    pub async fn extract_people(&self, input: ImagesInput) -> AppResult<PeopleOutput> {
        info!("👥 开始提取人物信息，共 {} 张图片", input.images.len());

        let adapter = &self.adapter;
        let people = self
            .batch
            .process_all(&input.images, |image| adapter.extract_person(image))
            .await?;

        let found = people.iter().filter(|p| p.found_count() > 0).count();
        info!("✓ 人物提取完成: {}/{} 张图片有结果", found, people.len());

        Ok(PeopleOutput { people })
    }

    pub async fn generate_morning_brief(
        &self,
        input: ImagesInput,
    ) -> AppResult<MorningBriefOutput> {
        info!("📰 开始生成晨报，共 {} 张图片", input.images.len());

        let adapter = &self.adapter;
        let analyses = self
            .batch
            .process_all(&input.images, |image| adapter.analyze_image(image))
            .await?;

        let brief = self.adapter.generate_brief(&analyses).await?;
        info!("✓ 晨报生成完成 ({} 字符)", brief.chars().count());

        Ok(MorningBriefOutput { analyses, brief })
    }
}
