//! # 进度条工具
//!
//! 封装 `indicatif` 提供统一的进度条样式，并把它接到核心库的
//! `Progress` 接口上。
//!
//! ## 依赖关系
//! - 被 `commands/` 模块使用
//! - 使用 `indicatif` crate

use indicatif::{ProgressBar, ProgressStyle};
use pxrd::Progress;

/// 进度条的刻度数
const TICKS: u64 = 1000;

/// 创建标准进度条
pub fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {msg}",
    )
    .map(|s| s.progress_chars("#>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

/// 创建 spinner（用于不确定进度的任务）
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.green} {elapsed_precise} {msg}")
        .map(|s| s.tick_strings(&["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"]))
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// 以进度条显示核心库的进度
///
/// CLI 没有停止来源，`should_stop` 总是为假。
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new(message: &str) -> Self {
        Self {
            bar: create_progress_bar(TICKS, message),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Progress for BarProgress {
    fn report(&mut self, part: f64, description: &str) {
        self.bar
            .set_position((part.clamp(0.0, 1.0) * TICKS as f64).round() as u64);
        self.bar.set_message(description.to_string());
    }

    fn should_stop(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_progress_position() {
        let mut p = BarProgress::new("test");
        p.bar.set_draw_target(indicatif::ProgressDrawTarget::hidden());
        p.report(0.25, "sector 1/4");
        assert_eq!(p.bar.position(), 250);
        p.report(2.0, "done");
        assert_eq!(p.bar.position(), TICKS);
        assert!(!p.should_stop());
    }
}
