//! # sin²θ 比值中的整数规律
//!
//! 以某个峰为参考，把所有峰的 `sin²θ` 除以参考峰的值再乘以倍数 j，
//! 若足够多的比值接近整数，则这些峰很可能属于同一套衍射指标。
//!
//! ## 功能
//! - 遍历参考峰 × 倍数 1..=max_multiplier，按接受规则筛选整数组
//! - 对每组用 Powell 法最小化零点偏移 Δθ 与倍数修正 Δm 后的偏差
//! - 结果按偏差升序排列，整数映射相同的组只保留偏差最小的一个
//! - 仅对 Δθ 做校正的 `correct_angle`
//!
//! ## 依赖关系
//! - 被 CLI `integers` 命令使用
//! - 使用 `numeric/optimize.rs` 的 Powell
//! - 使用 `progress.rs` 报告进度

use crate::error::{PxrdError, Result};
use crate::numeric::{std_dev, Minimizer, Powell};
use crate::progress::Progress;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 搜索参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegerSearchOptions {
    /// 与最近整数的距离小于该值即视为整数
    pub tolerance: f64,
    pub max_multiplier: u32,
    /// 被接受的整数值的最小（总体）标准差
    pub min_spread: f64,
    /// 接受一组所需的最少整数个数
    pub min_found: usize,
}

impl Default for IntegerSearchOptions {
    fn default() -> Self {
        Self {
            tolerance: 0.09,
            max_multiplier: 5,
            min_spread: 0.5,
            min_found: 3,
        }
    }
}

/// 一组整数关系
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegerGroup {
    /// 参考峰序号
    pub reference: usize,
    pub multiplier: u32,
    /// 峰序号 → 最近整数
    pub integers: BTreeMap<usize, i64>,
    /// 校正后的均方距离
    pub deviation: f64,
    /// (Δθ 弧度, Δm)
    pub correction: (f64, f64),
}

/// 搜索结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntegerSearch {
    pub groups: Vec<IntegerGroup>,
    /// 是否因取消而提前结束（已找到的组仍然保留）
    pub cancelled: bool,
}

/// 仅校正 Δθ 的结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AngleCorrection {
    pub delta_theta_deg: f64,
    pub deviation_before: f64,
    pub deviation_after: f64,
}

/// 到最近整数的距离
fn integer_distance(v: f64) -> f64 {
    (v - v.floor()).min(v.ceil() - v)
}

/// `m · sin²(θᵢ)/sin²(θ_ref)`
fn ratios(sin_theta: &[f64], reference: usize, multiplier: f64, delta_theta: f64) -> Vec<f64> {
    let sq: Vec<f64> = sin_theta
        .iter()
        .map(|s| (s.asin() + delta_theta).sin().powi(2))
        .collect();
    let base = sq[reference];
    sq.iter().map(|v| v / base * multiplier).collect()
}

/// 校正 `delta = [Δθ, Δm]` 后，掩码内比值到最近整数距离的均方
///
/// 掩码为空时返回 NaN。
pub fn theta_correction(
    delta: &[f64],
    sin_theta: &[f64],
    mask: &[bool],
    reference: usize,
    multiplier: f64,
) -> f64 {
    let dt = delta.first().copied().unwrap_or(0.0);
    let dm = delta.get(1).copied().unwrap_or(0.0);
    let y = ratios(sin_theta, reference, multiplier + dm, dt);
    let selected: Vec<f64> = y
        .iter()
        .zip(mask)
        .filter(|(_, &m)| m)
        .map(|(v, _)| integer_distance(*v).powi(2))
        .collect();
    if selected.is_empty() {
        return f64::NAN;
    }
    selected.iter().sum::<f64>() / selected.len() as f64
}

/// 逐个判断是否接近整数
pub fn like_integer(values: &[f64], tolerance: f64) -> Vec<bool> {
    values
        .iter()
        .map(|&v| integer_distance(v) < tolerance)
        .collect()
}

fn validate(sin_theta: &[f64]) -> Result<()> {
    if sin_theta.is_empty() {
        return Err(PxrdError::EmptyInput("peak positions".to_string()));
    }
    if let Some(s) = sin_theta.iter().find(|s| !(**s > 0.0 && **s <= 1.0)) {
        return Err(PxrdError::InvalidInput(format!(
            "sin(θ) must lie in (0, 1], got {}",
            s
        )));
    }
    Ok(())
}

/// 搜索 sin²θ 比值中的整数组
pub fn find_integers(
    sin_theta: &[f64],
    opts: &IntegerSearchOptions,
    progress: &mut dyn Progress,
) -> Result<IntegerSearch> {
    validate(sin_theta)?;
    let n = sin_theta.len();
    let powell = Powell::with_steps(vec![1e-3, 1e-2]);
    let mut search = IntegerSearch::default();

    for reference in 0..n {
        if progress.should_stop() {
            search.cancelled = true;
            break;
        }
        let mut first_count = 0;
        for multiplier in 1..=opts.max_multiplier {
            let y = ratios(sin_theta, reference, multiplier as f64, 0.0);
            let found = like_integer(&y, opts.tolerance);
            let values: Vec<f64> = y
                .iter()
                .zip(&found)
                .filter(|(_, &f)| f)
                .map(|(v, _)| *v)
                .collect();
            let count = values.len();
            if multiplier == 1 {
                first_count = count;
            }
            let accepted = count >= opts.min_found
                && (multiplier == 1 || count > first_count)
                && std_dev(&values) > opts.min_spread;
            if !accepted {
                continue;
            }

            let m = multiplier as f64;
            let objective = |d: &[f64]| theta_correction(d, sin_theta, &found, reference, m);
            let best = powell.minimize(&objective, &[0.0, 0.0]);
            let integers = y
                .iter()
                .zip(&found)
                .enumerate()
                .filter(|(_, (_, &f))| f)
                .map(|(k, (v, _))| (k, v.round() as i64))
                .collect();
            debug!(
                "reference {} × {}: {} integer(s), deviation {:.3e}",
                reference, multiplier, count, best.value
            );
            search.groups.push(IntegerGroup {
                reference,
                multiplier,
                integers,
                deviation: best.value,
                correction: (best.x[0], best.x[1]),
            });
        }
        progress.report(
            (reference + 1) as f64 / n as f64,
            &format!("reference {}/{}", reference + 1, n),
        );
    }

    search
        .groups
        .sort_by(|a, b| a.deviation.total_cmp(&b.deviation));
    let mut seen: Vec<BTreeMap<usize, i64>> = Vec::new();
    search.groups.retain(|g| {
        if seen.contains(&g.integers) {
            false
        } else {
            seen.push(g.integers.clone());
            true
        }
    });
    info!("{} distinct integer group(s)", search.groups.len());
    Ok(search)
}

/// 固定倍数，只对选定的峰校正零点偏移 Δθ
pub fn correct_angle(
    sin_theta: &[f64],
    reference: usize,
    multiplier: f64,
    selected: &[usize],
) -> Result<AngleCorrection> {
    validate(sin_theta)?;
    let n = sin_theta.len();
    if reference >= n {
        return Err(PxrdError::InvalidInput(format!(
            "reference peak {} out of range ({} peaks)",
            reference, n
        )));
    }
    if selected.is_empty() {
        return Err(PxrdError::EmptyInput("selected peaks".to_string()));
    }
    let mut mask = vec![false; n];
    for &i in selected {
        match mask.get_mut(i) {
            Some(m) => *m = true,
            None => {
                return Err(PxrdError::InvalidInput(format!(
                    "selected peak {} out of range ({} peaks)",
                    i, n
                )))
            }
        }
    }

    let objective = |d: &[f64]| theta_correction(&[d[0], 0.0], sin_theta, &mask, reference, multiplier);
    let before = objective(&[0.0]);
    let best = Powell::with_steps(vec![1e-3]).minimize(&objective, &[0.0]);
    Ok(AngleCorrection {
        delta_theta_deg: best.x[0].to_degrees(),
        deviation_before: before,
        deviation_after: best.value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{Silent, Status};

    /// sin²θ = 0.02·n
    fn cubic_like(shift: f64) -> Vec<f64> {
        [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 8.0, 9.0]
            .iter()
            .map(|n: &f64| ((0.02 * n).sqrt().asin() + shift).sin())
            .collect()
    }

    #[test]
    fn test_like_integer() {
        let flags = like_integer(&[1.0, 2.05, 2.5, 2.95, 3.1], 0.09);
        assert_eq!(flags, vec![true, true, false, true, false]);
    }

    #[test]
    fn test_theta_correction_empty_mask() {
        let s = cubic_like(0.0);
        assert!(theta_correction(&[0.0, 0.0], &s, &[false; 8], 0, 1.0).is_nan());
        assert!(theta_correction(&[0.0, 0.0], &s, &[true; 8], 0, 1.0) < 1e-20);
    }

    #[test]
    fn test_exact_group_is_found() {
        let s = cubic_like(0.0);
        let search = find_integers(&s, &IntegerSearchOptions::default(), &mut Silent).unwrap();
        assert!(!search.cancelled);
        let exact = search
            .groups
            .iter()
            .find(|g| g.reference == 0 && g.multiplier == 1)
            .unwrap();
        assert!(exact.deviation < 1e-12);
        assert_eq!(exact.integers.len(), 8);
        assert_eq!(exact.integers[&6], 8);
        assert!(search
            .groups
            .windows(2)
            .all(|w| w[0].deviation <= w[1].deviation));
        for (i, a) in search.groups.iter().enumerate() {
            for b in &search.groups[i + 1..] {
                assert_ne!(a.integers, b.integers);
            }
        }
    }

    #[test]
    fn test_cancel_keeps_nothing_before_start() {
        let s = cubic_like(0.0);
        let mut status = Status::new();
        status.stop();
        let search = find_integers(&s, &IntegerSearchOptions::default(), &mut status).unwrap();
        assert!(search.cancelled);
        assert!(search.groups.is_empty());
    }

    #[test]
    fn test_invalid_positions() {
        let opts = IntegerSearchOptions::default();
        assert!(find_integers(&[], &opts, &mut Silent).is_err());
        assert!(find_integers(&[0.1, 0.0], &opts, &mut Silent).is_err());
        assert!(correct_angle(&[0.1, 0.2], 2, 1.0, &[0]).is_err());
        assert!(correct_angle(&[0.1, 0.2], 0, 1.0, &[5]).is_err());
    }

    #[test]
    fn test_correct_angle_recovers_offset() {
        let s = cubic_like(-0.002);
        let all: Vec<usize> = (0..s.len()).collect();
        let fix = correct_angle(&s, 0, 1.0, &all).unwrap();
        assert!(fix.deviation_after < fix.deviation_before);
        assert!((fix.delta_theta_deg.to_radians() - 0.002).abs() < 1e-5);
    }
}
