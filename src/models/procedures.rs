//! 对外过程的输入输出结构

use serde::{Deserialize, Serialize};

use super::person::PersonRecord;

#[derive(Debug, Clone, Deserialize)]
pub struct EchoInput {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EchoOutput {
    pub greeting: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeImageInput {
    pub image: String,
}

/// 批量图片输入（extractPeople / generateMorningBrief）
#[derive(Debug, Clone, Deserialize)]
pub struct ImagesInput {
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeopleOutput {
    pub people: Vec<PersonRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MorningBriefOutput {
    pub analyses: Vec<String>,
    pub brief: String,
}

/// 任一过程的输出
///
/// 批量调用时不同过程的结果放在同一个数组里返回。
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ProcedureOutput {
    Echo(EchoOutput),
    Analysis(String),
    People(PeopleOutput),
    Brief(MorningBriefOutput),
}
