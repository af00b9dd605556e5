//! # 多项式最小二乘
//!
//! 内部把 x 线性映射到 [-1, 1] 再拟合，避免 2θ 等大数值横坐标下
//! Vandermonde 矩阵病态；`raw_coefficients` 给出关于原始 x 的升幂系数。
//!
//! ## 依赖关系
//! - 被 `peaks/background.rs`、`cell/angle.rs` 使用
//! - 使用 `numeric/linalg.rs`

use crate::error::{ensure_same_len, PxrdError, Result};
use crate::numeric::linalg;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// 多项式 `p(x) = Σ cᵢ·tⁱ`，其中 `t = (x − center) / scale`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polynomial {
    pub center: f64,
    pub scale: f64,
    /// 关于 t 的升幂系数
    pub coefficients: Vec<f64>,
}

impl Polynomial {
    /// 以原始 x 的升幂系数构造
    pub fn from_raw(coefficients: Vec<f64>) -> Self {
        Self {
            center: 0.0,
            scale: 1.0,
            coefficients,
        }
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    /// Horner 求值
    pub fn eval(&self, x: f64) -> f64 {
        let t = (x - self.center) / self.scale;
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * t + c)
    }

    pub fn eval_all(&self, x: &[f64]) -> Vec<f64> {
        x.iter().map(|&v| self.eval(v)).collect()
    }

    /// 关于原始 x 的升幂系数
    pub fn raw_coefficients(&self) -> Vec<f64> {
        let n = self.coefficients.len();
        let mut raw = vec![0.0; n];
        // (x − c)^i / s^i 的二项式展开
        for (i, &ci) in self.coefficients.iter().enumerate() {
            let factor = ci / self.scale.powi(i as i32);
            let mut binom = 1.0;
            for j in 0..=i {
                // C(i, j) · x^j · (−c)^(i−j)
                raw[j] += factor * binom * (-self.center).powi((i - j) as i32);
                binom = binom * (i - j) as f64 / (j + 1) as f64;
            }
        }
        raw
    }
}

/// 阶数为 `degree` 的最小二乘多项式拟合
///
/// 需要至少 `degree + 1` 个点，且 x 中至少有 `degree + 1` 个不同值。
pub fn polyfit(x: &[f64], y: &[f64], degree: usize) -> Result<Polynomial> {
    ensure_same_len("polyfit y", x.len(), y.len())?;
    if x.is_empty() {
        return Err(PxrdError::EmptyInput("polyfit".to_string()));
    }
    if x.len() <= degree {
        return Err(PxrdError::DegreeTooHigh {
            degree,
            points: x.len(),
        });
    }

    let (lo, hi) = x
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let center = 0.5 * (lo + hi);
    let scale = if hi > lo { 0.5 * (hi - lo) } else { 1.0 };

    let cols = degree + 1;
    let m = DMatrix::from_fn(x.len(), cols, |r, c| {
        ((x[r] - center) / scale).powi(c as i32)
    });
    let coefficients = linalg::least_squares(m, y)?;

    Ok(Polynomial {
        center,
        scale,
        coefficients,
    })
}

/// 以原始 x 升幂系数求值
pub fn polyval(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_quadratic() {
        let x: Vec<f64> = (0..20).map(|i| 10.0 + i as f64 * 7.0).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 - 0.5 * v + 0.01 * v * v).collect();
        let p = polyfit(&x, &y, 2).unwrap();
        for (xi, yi) in x.iter().zip(&y) {
            assert!((p.eval(*xi) - yi).abs() < 1e-9);
        }
        let raw = p.raw_coefficients();
        assert!((raw[0] - 3.0).abs() < 1e-8);
        assert!((raw[1] + 0.5).abs() < 1e-10);
        assert!((raw[2] - 0.01).abs() < 1e-12);
        assert!((polyval(&raw, 50.0) - p.eval(50.0)).abs() < 1e-9);
    }

    #[test]
    fn test_degree_checks() {
        let err = polyfit(&[1.0, 2.0], &[1.0, 2.0], 2).unwrap_err();
        assert_eq!(err, PxrdError::DegreeTooHigh { degree: 2, points: 2 });
        assert!(polyfit(&[1.0, 2.0], &[1.0], 1).unwrap_err().is_contract_violation());
        // 所有 x 相同：秩亏
        assert!(polyfit(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0], 1).unwrap_err().is_numerical());
    }

    #[test]
    fn test_constant_fit() {
        let p = polyfit(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0], 0).unwrap();
        assert!((p.eval(100.0) - 2.0).abs() < 1e-12);
        assert_eq!(p.degree(), 0);
    }
}
