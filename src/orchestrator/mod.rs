//! 编排层（Orchestration Layer）
//!
//! 负责批量调度，不包含任何与具体推理相关的业务判断。
//!
//! ```text
//! workflow::Procedures (一次请求的全部图片)
//!     ↓
//! orchestrator::BatchProcessor (分批、批内并发、按序汇总)
//!     ↓
//! services::InferenceAdapter (单张图片)
//!     ↓
//! clients::ChatBackend (上游接口)
//! ```

pub mod batch_processor;

pub use batch_processor::{BatchProcessor, ItemOutcome};
