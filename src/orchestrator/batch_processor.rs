//! 批量处理器 - 编排层
//!
//! ## 职责
//!
//! 把一组输入按固定大小分批，批内并发、批间串行地交给 worker 处理，
//! 并按输入顺序汇总结果。
//!
//! ## 保证
//!
//! 1. **顺序**：输出与输入一一对应、顺序一致，与批内完成先后无关
//! 2. **串行批次**：第 N+1 批在第 N 批全部结束后才开始
//! 3. **全有或全无**（`process_all`）：任一项失败则整个调用失败，不返回部分结果
//! 4. **上限**：配置了 `max_items` 时，超出上限的输入在执行任何任务前被拒绝
//!
//! 批内并发通过 `join_all` 在当前任务内轮询完成，不 spawn 新任务，
//! 因此 worker 可以直接借用调用方的数据。

use std::fmt::Display;
use std::future::Future;
use std::num::NonZeroUsize;
use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::BatchError;

/// 单项处理结果（`process_all_settled` 使用）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome<R, E> {
    Success(R),
    Failure(E),
}

impl<R, E> ItemOutcome<R, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Success(_))
    }
}

impl<R, E> From<Result<R, E>> for ItemOutcome<R, E> {
    fn from(result: Result<R, E>) -> Self {
        match result {
            Ok(value) => ItemOutcome::Success(value),
            Err(reason) => ItemOutcome::Failure(reason),
        }
    }
}

/// 批量处理器
#[derive(Debug, Clone, Copy)]
pub struct BatchProcessor {
    batch_size: NonZeroUsize,
    max_items: Option<usize>,
}

impl BatchProcessor {
    pub fn new(batch_size: NonZeroUsize, max_items: Option<usize>) -> Self {
        Self {
            batch_size,
            max_items,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.batch_size, config.max_images_per_request)
    }

    /// 处理全部输入（全有或全无）
    ///
    /// 任一项失败时返回该批中下标最小的失败项，之后的批次不会开始。
    pub async fn process_all<'a, T, R, E, F, Fut>(
        &self,
        items: &'a [T],
        worker: F,
    ) -> Result<Vec<R>, BatchError<E>>
    where
        F: Fn(&'a T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: Display,
    {
        let mut outputs = Vec::with_capacity(items.len());

        self.run_batches(items, worker, |batch_start, results| {
            for (offset, result) in results.into_iter().enumerate() {
                match result {
                    Ok(value) => outputs.push(value),
                    Err(source) => {
                        let index = batch_start + offset;
                        warn!("❌ 第 {} 项处理失败，终止批处理: {}", index + 1, source);
                        return Err(BatchError::Item { index, source });
                    }
                }
            }
            Ok(())
        })
        .await?;

        Ok(outputs)
    }

    /// 处理全部输入，逐项返回成功或失败
    ///
    /// 单项失败不影响其他项；只有超出数量上限时整个调用失败。
    pub async fn process_all_settled<'a, T, R, E, F, Fut>(
        &self,
        items: &'a [T],
        worker: F,
    ) -> Result<Vec<ItemOutcome<R, E>>, BatchError<E>>
    where
        F: Fn(&'a T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: Display,
    {
        let mut outcomes = Vec::with_capacity(items.len());

        self.run_batches(items, worker, |batch_start, results| {
            for (offset, result) in results.into_iter().enumerate() {
                if let Err(reason) = &result {
                    warn!("⚠️ 第 {} 项处理失败: {}", batch_start + offset + 1, reason);
                }
                outcomes.push(ItemOutcome::from(result));
            }
            Ok(())
        })
        .await?;

        Ok(outcomes)
    }

    /// 分批执行，每批结束后把结果交给 `on_batch`
    async fn run_batches<'a, T, R, E, F, Fut, G>(
        &self,
        items: &'a [T],
        worker: F,
        mut on_batch: G,
    ) -> Result<(), BatchError<E>>
    where
        F: Fn(&'a T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        G: FnMut(usize, Vec<Result<R, E>>) -> Result<(), BatchError<E>>,
    {
        let total = items.len();
        self.check_limit(total)?;

        if total == 0 {
            debug!("没有待处理的输入");
            return Ok(());
        }

        let batch_size = self.batch_size.get();
        let total_batches = total.div_ceil(batch_size);
        let started = Instant::now();
        log_items_loaded(total, batch_size);

        // 分批处理
        for batch_start in (0..total).step_by(batch_size) {
            let batch_end = (batch_start + batch_size).min(total);
            let batch_num = batch_start / batch_size + 1;

            log_batch_start(batch_num, total_batches, batch_start + 1, batch_end, total);

            // 本批全部发起，再一起等待
            let batch: &'a [T] = &items[batch_start..batch_end];
            let results = join_all(batch.iter().map(&worker)).await;

            let success = results.iter().filter(|r| r.is_ok()).count();
            log_batch_complete(batch_num, success, results.len());

            on_batch(batch_start, results)?;
        }

        log_final_stats(total, started);
        Ok(())
    }

    fn check_limit<E>(&self, count: usize) -> Result<(), BatchError<E>> {
        match self.max_items {
            Some(max) if count > max => {
                warn!("⚠️ 输入数量 {} 超过上限 {}，拒绝处理", count, max);
                Err(BatchError::TooManyItems { count, max })
            }
            _ => Ok(()),
        }
    }
}

// ========== 日志辅助函数 ==========

fn log_items_loaded(total: usize, batch_size: usize) {
    info!("✓ 收到 {} 个待处理项", total);
    info!("📋 将以每批 {} 个的方式处理，每批完成后再开始下一批", batch_size);
}

fn log_batch_start(
    batch_num: usize,
    total_batches: usize,
    start: usize,
    end: usize,
    total: usize,
) {
    info!("{}", "=".repeat(60));
    info!("📦 开始处理第 {}/{} 批", batch_num, total_batches);
    info!("📄 本批: {}-{} / 共 {} 个", start, end, total);
}

fn log_batch_complete(batch_num: usize, success: usize, total: usize) {
    info!("✓ 第 {} 批完成: 成功 {}/{}", batch_num, success, total);
    info!("{}", "─".repeat(60));
}

fn log_final_stats(total: usize, started: Instant) {
    info!(
        "📊 全部 {} 项处理完成，耗时 {} 毫秒",
        total,
        started.elapsed().as_millis()
    );
}
