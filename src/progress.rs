//! # 进度报告与协作式取消
//!
//! 长时间运行的操作（逐扇区分峰、指标搜索）在迭代边界调用
//! `Progress::report` 报告完成比例，并通过 `should_stop` 检查取消请求。
//! 取消只在扇区 / 峰数 / 参考峰边界生效，从不打断单次优化。
//!
//! ## 依赖关系
//! - 被 `peaks/decompose.rs`、`peaks/search.rs`、`index/integers.rs` 使用
//! - CLI 在 `utils/progress.rs` 中基于 indicatif 实现该 trait

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 进度接收方
pub trait Progress {
    /// `part` 为完成比例（0..=1）
    fn report(&mut self, part: f64, description: &str);

    /// 调用方是否请求停止
    fn should_stop(&self) -> bool;
}

/// 可跨线程设置的停止标志
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// 记录最近一次进度的状态对象
#[derive(Debug, Clone, Default)]
pub struct Status {
    pub part: f64,
    pub description: String,
    stop: CancelToken,
}

impl Status {
    pub fn new() -> Self {
        Self::default()
    }

    /// 与本状态共享停止标志的句柄
    pub fn cancel_token(&self) -> CancelToken {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.cancel();
    }
}

impl Progress for Status {
    fn report(&mut self, part: f64, description: &str) {
        self.part = part.clamp(0.0, 1.0);
        self.description.clear();
        self.description.push_str(description);
    }

    fn should_stop(&self) -> bool {
        self.stop.is_cancelled()
    }
}

/// 把子任务的进度映射到父进度的 `[offset, offset + span]` 区间
pub struct SubProgress<'p> {
    parent: &'p mut dyn Progress,
    offset: f64,
    span: f64,
}

impl<'p> SubProgress<'p> {
    pub fn new(parent: &'p mut dyn Progress, offset: f64, span: f64) -> Self {
        Self {
            parent,
            offset,
            span,
        }
    }
}

impl Progress for SubProgress<'_> {
    fn report(&mut self, part: f64, description: &str) {
        let part = self.offset + self.span * part.clamp(0.0, 1.0);
        self.parent.report(part, description);
    }

    fn should_stop(&self) -> bool {
        self.parent.should_stop()
    }
}

/// 不报告、不取消
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl Progress for Silent {
    fn report(&mut self, _part: f64, _description: &str) {}

    fn should_stop(&self) -> bool {
        false
    }
}
