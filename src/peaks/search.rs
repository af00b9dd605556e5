//! # 整张图样的峰搜索
//!
//! 对扣除背景的图样逐扇区分峰，并汇总结果。
//!
//! ## 功能
//! - 扇区分割与过滤
//! - 自动分峰或在候选峰位上分峰
//! - 单个扇区失败不影响其他扇区，失败详情记录在报告中
//! - 逐扇区报告进度，在扇区之间响应取消
//!
//! ## 依赖关系
//! - 被 CLI `peaks` 命令调用
//! - 使用 `peaks/sectors.rs` 分割扇区
//! - 使用 `peaks/decompose.rs` 分峰

use crate::error::{PxrdError, Result};
use crate::models::{PeakList, PeakRecord, Satellite};
use crate::numeric::Minimizer;
use crate::peaks::decompose::{DecomposeOptions, PeakDecomposer};
use crate::peaks::sectors::{sectors, Sector, SectorOptions};
use crate::progress::{Progress, SubProgress};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// 用户给定的候选峰位
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub x: f64,
    /// 为真时峰位不参与精修
    pub fixed: bool,
}

/// 峰搜索配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakSearchConfig {
    pub sectors: SectorOptions,
    pub decompose: DecomposeOptions,
    /// `None` 时自动确定峰数，否则只在落入扇区的候选峰位上拟合
    pub candidates: Option<Vec<Candidate>>,
    pub satellites: Vec<Satellite>,
}

/// 单个扇区的处理结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SectorOutcome {
    /// 拟合成功
    Fitted {
        range: (f64, f64),
        peaks: usize,
        stdev: f64,
    },
    /// 没有峰（所有峰被丢弃，或扇区内没有候选峰位）
    Empty { range: (f64, f64) },
    /// 拟合失败
    Failed {
        range: (f64, f64),
        error: PxrdError,
    },
}

/// 峰搜索结果统计
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakSearchReport {
    /// 合并后按 x0 排序的峰列表
    pub peaks: PeakList,
    pub outcomes: Vec<SectorOutcome>,
    /// 是否因取消而提前结束
    pub cancelled: bool,
}

impl PeakSearchReport {
    fn new(config: &PeakSearchConfig) -> Self {
        Self {
            peaks: PeakList::new(config.decompose.shape, Vec::new()),
            outcomes: Vec::new(),
            cancelled: false,
        }
    }

    /// 合并一个扇区的结果
    pub fn merge(&mut self, outcome: SectorOutcome, records: Vec<PeakRecord>) {
        self.peaks.peaks.extend(records);
        self.outcomes.push(outcome);
    }

    pub fn fitted(&self) -> usize {
        self.count(|o| matches!(o, SectorOutcome::Fitted { .. }))
    }

    pub fn empty(&self) -> usize {
        self.count(|o| matches!(o, SectorOutcome::Empty { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, SectorOutcome::Failed { .. }))
    }

    /// 已处理的扇区数
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// 失败详情
    pub fn failures(&self) -> impl Iterator<Item = (&(f64, f64), &PxrdError)> {
        self.outcomes.iter().filter_map(|o| match o {
            SectorOutcome::Failed { range, error } => Some((range, error)),
            _ => None,
        })
    }

    fn count(&self, pred: impl Fn(&SectorOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }

    fn finish(mut self) -> Self {
        let shape = self.peaks.shape;
        self.peaks = PeakList::new(shape, std::mem::take(&mut self.peaks.peaks));
        self
    }
}

fn process_sector(
    sector: Sector,
    config: &PeakSearchConfig,
    minimizer: &dyn Minimizer,
    progress: &mut dyn Progress,
) -> (SectorOutcome, Vec<PeakRecord>) {
    let range = sector.range();
    let decomposer = PeakDecomposer::new(sector, &config.satellites, minimizer);

    let fitted = match &config.candidates {
        None => decomposer.find_bells(&config.decompose, progress),
        Some(candidates) => {
            let inside: Vec<&Candidate> = candidates
                .iter()
                .filter(|c| decomposer.sector().contains(c.x))
                .collect();
            let positions: Vec<f64> = inside.iter().map(|c| c.x).collect();
            let fixed: Vec<bool> = inside.iter().map(|c| c.fixed).collect();
            decomposer.find_bells_pp(config.decompose.shape, &positions, &fixed)
        }
    };

    match fitted {
        Ok(dec) if dec.bells.is_empty() => (SectorOutcome::Empty { range }, Vec::new()),
        Ok(dec) => (
            SectorOutcome::Fitted {
                range,
                peaks: dec.bells.len(),
                stdev: dec.stdev,
            },
            dec.records(),
        ),
        Err(error) => {
            warn!(
                "sector [{:.6}, {:.6}] failed: {}",
                range.0, range.1, error
            );
            (SectorOutcome::Failed { range, error }, Vec::new())
        }
    }
}

/// 在扣除背景的图样上搜索并分解全部峰
pub fn find_peaks(
    x: &[f64],
    stripped_y: &[f64],
    sigma2: f64,
    config: &PeakSearchConfig,
    minimizer: &dyn Minimizer,
    progress: &mut dyn Progress,
) -> Result<PeakSearchReport> {
    let all: Vec<Sector> = sectors(x, stripped_y, sigma2, &config.sectors)?.collect();
    let total = all.len();
    debug!("{} sector(s) to decompose", total);

    let mut report = PeakSearchReport::new(config);
    for (i, sector) in all.into_iter().enumerate() {
        if progress.should_stop() {
            report.cancelled = true;
            break;
        }
        let span = 1.0 / total as f64;
        let (outcome, records) = {
            let mut sub = SubProgress::new(progress, i as f64 * span, span);
            process_sector(sector, config, minimizer, &mut sub)
        };
        report.merge(outcome, records);
        // 扇区内的分峰可能已被截断
        if progress.should_stop() {
            report.cancelled = true;
            break;
        }
        progress.report(
            (i + 1) as f64 / total as f64,
            &format!("sector {}/{}", i + 1, total),
        );
    }

    Ok(report.finish())
}
