//! # 数值工具模块
//!
//! 多项式最小二乘、小型线性方程组、无导数优化器与统计辅助函数。
//!
//! ## 依赖关系
//! - 被 `peaks/`、`cell/`、`index/`、`broadening.rs` 使用
//! - 子模块: linalg, optimize, poly
//! - 使用 `nalgebra` 做 SVD 求解

pub mod linalg;
pub mod optimize;
pub mod poly;

pub use optimize::{Minimizer, Minimum, NelderMead, Powell};
pub use poly::{polyfit, polyval};

/// 算术平均（空切片返回 NaN）
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// 总体方差（除以 n）
pub fn variance(values: &[f64]) -> f64 {
    let m = mean(values);
    if m.is_nan() {
        return f64::NAN;
    }
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}

/// 总体标准差
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// 梯形积分
pub fn trapezoid(y: &[f64], x: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xw, yw)| 0.5 * (xw[1] - xw[0]) * (yw[0] + yw[1]))
        .sum()
}

/// `[start, stop]` 上的 `n` 个等距点（含端点）
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Pearson 相关系数
pub fn correlation(x: &[f64], y: &[f64]) -> f64 {
    let mx = mean(x);
    let my = mean(y);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx) * (a - mx);
        syy += (b - my) * (b - my);
    }
    sxy / (sxx * syy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistics() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(mean(&v), 2.5);
        assert_eq!(variance(&v), 1.25);
        assert!((std_dev(&v) - 1.25f64.sqrt()).abs() < 1e-15);
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn test_trapezoid_and_linspace() {
        let x = linspace(0.0, 1.0, 101);
        assert_eq!(x.len(), 101);
        assert_eq!(x[100], 1.0);
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v).collect();
        assert!((trapezoid(&y, &x) - 1.0).abs() < 1e-12);
        assert_eq!(linspace(3.0, 4.0, 1), vec![3.0]);
    }

    #[test]
    fn test_correlation() {
        let x = [1.0, 2.0, 3.0];
        assert!((correlation(&x, &[2.0, 4.0, 6.0]) - 1.0).abs() < 1e-12);
        assert!((correlation(&x, &[3.0, 2.0, 1.0]) + 1.0).abs() < 1e-12);
    }
}
