//! # 峰宽化分析（尺寸 / 微应变）
//!
//! 对选定的峰做 Williamson–Hall 回归：
//!
//! ```text
//! β_s·cosθ = Kλ/L + 4ε·sinθ,   K = 0.9
//! ```
//!
//! 其中 `β` 是以 2θ 弧度计的半高全宽，由 sinθ 坐标下的峰宽换算
//! （`β = 2·FWHM_sinθ / cosθ`）。样品宽化 `β_s` 由总宽化扣除仪器宽化 `βᵢ`：
//! Gaussian 按平方相减，Lorentzian 直接相减。
//! 未给出 `βᵢ` 时，取使 `|corr(sinθ, β_s·cosθ)|` 最大的值。
//!
//! ## 依赖关系
//! - 被 CLI `peaks --broadening` 使用
//! - 使用 `numeric/` 的最小二乘、相关系数与优化器

use crate::error::{PxrdError, Result};
use crate::models::PeakList;
use crate::numeric::linalg::least_squares;
use crate::numeric::{correlation, Minimizer};
use crate::peaks::shapes::ShapeKind;

use log::debug;
use nalgebra::DMatrix;
use serde::Serialize;

/// Scherrer 常数
pub const SCHERRER_K: f64 = 0.9;

/// 宽化分析结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BroadeningReport {
    /// 相干散射区尺寸（与波长同单位）
    pub size: f64,
    /// 微应变
    pub strain: f64,
    /// 仪器宽化（2θ 弧度）
    pub instrumental: f64,
    /// 回归的 Pearson 相关系数
    pub correlation: f64,
    /// 参与回归的峰数
    pub points: usize,
}

/// 回归所用的数据点
struct Points {
    shape: ShapeKind,
    sin: Vec<f64>,
    cos: Vec<f64>,
    /// 总宽化 β（2θ 弧度）
    beta: Vec<f64>,
}

impl Points {
    fn sample_broadening(&self, instrumental: f64, total: f64) -> f64 {
        match self.shape {
            ShapeKind::Gaussian => (total * total - instrumental * instrumental).sqrt(),
            _ => total - instrumental,
        }
    }

    /// `β_s·cosθ`
    fn reduced(&self, instrumental: f64) -> Vec<f64> {
        self.beta
            .iter()
            .zip(&self.cos)
            .map(|(b, c)| self.sample_broadening(instrumental, *b) * c)
            .collect()
    }

    fn correlation(&self, instrumental: f64) -> f64 {
        correlation(&self.sin, &self.reduced(instrumental))
    }

    /// (size, strain)
    fn size_strain(&self, instrumental: f64, wavelength: f64) -> Result<(f64, f64)> {
        let y = self.reduced(instrumental);
        if let Some(v) = y.iter().find(|v| !v.is_finite()) {
            return Err(PxrdError::Unsolvable(format!(
                "instrumental broadening {:.6e} exceeds a peak width (β_s·cosθ = {})",
                instrumental, v
            )));
        }
        let n = self.sin.len();
        let m = DMatrix::from_fn(n, 2, |i, j| if j == 0 { self.sin[i] } else { 1.0 });
        let coef = least_squares(m, &y)?;
        Ok((SCHERRER_K * wavelength / coef[1], coef[0] / 4.0))
    }
}

fn collect_points(peaks: &PeakList, selected: &[usize]) -> Result<Points> {
    match peaks.shape {
        ShapeKind::Gaussian | ShapeKind::Lorentzian => {}
        other => return Err(PxrdError::UnsupportedShape(other.name().to_string())),
    }
    let mut idx = selected.to_vec();
    idx.sort_unstable();
    idx.dedup();
    if idx.len() < 2 {
        return Err(PxrdError::InvalidInput(format!(
            "broadening analysis needs at least 2 distinct peaks, got {}",
            idx.len()
        )));
    }

    let mut points = Points {
        shape: peaks.shape,
        sin: Vec::with_capacity(idx.len()),
        cos: Vec::with_capacity(idx.len()),
        beta: Vec::with_capacity(idx.len()),
    };
    for i in idx {
        let p = peaks.peaks.get(i).ok_or_else(|| {
            PxrdError::InvalidInput(format!(
                "selected peak {} out of range ({} peaks)",
                i,
                peaks.len()
            ))
        })?;
        if !(p.x0 > 0.0 && p.x0 < 1.0) {
            return Err(PxrdError::InvalidInput(format!(
                "peak position must be sin(θ) in (0, 1), got {}",
                p.x0
            )));
        }
        let cos = (1.0 - p.x0 * p.x0).sqrt();
        points.sin.push(p.x0);
        points.cos.push(cos);
        points.beta.push(2.0 * peaks.shape.fwhm(p.width) / cos);
    }
    Ok(points)
}

/// 对选定峰做尺寸 / 应变分析
///
/// `peaks` 的横坐标须为 sinθ。`instrumental` 为 `None` 时由 `minimizer`
/// 从最窄峰宽的一半出发估计仪器宽化。
pub fn analyze_broadening(
    peaks: &PeakList,
    selected: &[usize],
    wavelength: f64,
    instrumental: Option<f64>,
    minimizer: &dyn Minimizer,
) -> Result<BroadeningReport> {
    if !(wavelength > 0.0 && wavelength.is_finite()) {
        return Err(PxrdError::InvalidInput(format!(
            "wavelength must be positive, got {}",
            wavelength
        )));
    }
    let points = collect_points(peaks, selected)?;

    let instrumental = match instrumental {
        Some(b) if b.is_finite() && b >= 0.0 => b,
        Some(b) => {
            return Err(PxrdError::InvalidInput(format!(
                "instrumental broadening must be non-negative, got {}",
                b
            )))
        }
        None => {
            let narrowest = points.beta.iter().copied().fold(f64::INFINITY, f64::min);
            let best = minimizer.minimize(
                &|b: &[f64]| -points.correlation(b[0]).abs(),
                &[0.5 * narrowest],
            );
            debug!(
                "instrumental broadening {:.6e} (|corr| = {:.6})",
                best.x[0], -best.value
            );
            best.x[0]
        }
    };

    let (size, strain) = points.size_strain(instrumental, wavelength)?;
    Ok(BroadeningReport {
        size,
        strain,
        instrumental,
        correlation: points.correlation(instrumental),
        points: points.sin.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PeakRecord;
    use crate::numeric::NelderMead;

    const LAMBDA: f64 = 1.5406;
    const SIZE: f64 = 200.0;
    const STRAIN: f64 = 1e-3;
    const INSTR: f64 = 0.002;

    /// 按 Williamson–Hall 关系构造峰宽
    fn synthetic(shape: ShapeKind) -> PeakList {
        let peaks = [0.2, 0.3, 0.4, 0.5, 0.6]
            .iter()
            .map(|&s: &f64| {
                let cos = (1.0 - s * s).sqrt();
                let sample = (SCHERRER_K * LAMBDA / SIZE + 4.0 * STRAIN * s) / cos;
                let (beta, width) = match shape {
                    ShapeKind::Gaussian => {
                        let beta = (sample * sample + INSTR * INSTR).sqrt();
                        let half = beta * cos / 4.0;
                        (beta, half * half / 2f64.ln())
                    }
                    _ => {
                        let beta = sample + INSTR;
                        let half = beta * cos / 4.0;
                        (beta, half * half)
                    }
                };
                assert!(beta > 0.0);
                PeakRecord {
                    x0: s,
                    height: 1.0,
                    width,
                    stdev: 0.0,
                }
            })
            .collect();
        PeakList::new(shape, peaks)
    }

    #[test]
    fn test_lorentzian_known_instrumental() {
        let peaks = synthetic(ShapeKind::Lorentzian);
        let all: Vec<usize> = (0..5).collect();
        let r = analyze_broadening(&peaks, &all, LAMBDA, Some(INSTR), &NelderMead::default())
            .unwrap();
        assert!((r.size - SIZE).abs() < 1e-6 * SIZE);
        assert!((r.strain - STRAIN).abs() < 1e-9);
        assert!((r.correlation - 1.0).abs() < 1e-9);
        assert_eq!(r.points, 5);
    }

    #[test]
    fn test_gaussian_known_instrumental() {
        let peaks = synthetic(ShapeKind::Gaussian);
        let r = analyze_broadening(&peaks, &[0, 1, 2, 3, 4], LAMBDA, Some(INSTR), &NelderMead::default())
            .unwrap();
        assert!((r.size - SIZE).abs() < 1e-6 * SIZE);
        assert!((r.strain - STRAIN).abs() < 1e-9);
    }

    #[test]
    fn test_estimated_instrumental() {
        let peaks = synthetic(ShapeKind::Lorentzian);
        let r = analyze_broadening(&peaks, &[0, 1, 2, 3, 4], LAMBDA, None, &NelderMead::default())
            .unwrap();
        assert!(r.correlation.abs() > 0.999);
        assert!((r.instrumental - INSTR).abs() < 5e-4);
    }

    #[test]
    fn test_rejected_inputs() {
        let nm = NelderMead::default();
        let peaks = synthetic(ShapeKind::Lorentzian);
        assert!(analyze_broadening(&peaks, &[1, 1], LAMBDA, Some(0.0), &nm).is_err());
        assert!(analyze_broadening(&peaks, &[0, 9], LAMBDA, Some(0.0), &nm).is_err());
        assert!(analyze_broadening(&peaks, &[0, 1], 0.0, Some(0.0), &nm).is_err());

        let voigt = PeakList::new(ShapeKind::PseudoVoigt, peaks.peaks.clone());
        let err = analyze_broadening(&voigt, &[0, 1], LAMBDA, Some(0.0), &nm).unwrap_err();
        assert!(err.is_unsupported());
    }
}
