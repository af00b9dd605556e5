//! # 小型线性方程组
//!
//! 对称正规方程组的求解与求逆。奇异（或秩亏）矩阵显式报错，
//! 不返回无意义的数值。
//!
//! ## 依赖关系
//! - 被 `numeric/poly.rs`、`cell/refine.rs` 使用
//! - 使用 `nalgebra` 的 SVD

use crate::error::{PxrdError, Result};

use nalgebra::{DMatrix, DVector};

/// 条件数倒数低于该值视为奇异
const RCOND_LIMIT: f64 = 1e-12;

/// 求解结果：解向量与系数矩阵的（伪）逆
#[derive(Debug, Clone)]
pub struct Solution {
    pub x: Vec<f64>,
    pub inverse: DMatrix<f64>,
}

/// 求解方阵方程 `A·x = b`，同时给出 `A⁻¹`
pub fn solve_with_inverse(a: DMatrix<f64>, b: &[f64]) -> Result<Solution> {
    let n = a.nrows();
    if n == 0 || a.ncols() != n || b.len() != n {
        return Err(PxrdError::InvalidInput(format!(
            "expected a square system, got {}x{} with rhs of length {}",
            a.nrows(),
            a.ncols(),
            b.len()
        )));
    }
    if a.iter().any(|v| !v.is_finite()) || b.iter().any(|v| !v.is_finite()) {
        return Err(PxrdError::Singular(
            "matrix contains non-finite entries".to_string(),
        ));
    }

    let svd = a.svd(true, true);
    let s_max = svd.singular_values.max();
    let s_min = svd.singular_values.min();
    if !(s_max > 0.0) || s_min / s_max < RCOND_LIMIT {
        return Err(PxrdError::Singular(format!(
            "{}x{} system is rank deficient (singular values {:.3e}..{:.3e})",
            n, n, s_min, s_max
        )));
    }

    let eps = s_max * RCOND_LIMIT;
    let rhs = DVector::from_column_slice(b);
    let x = svd
        .solve(&rhs, eps)
        .map_err(|e| PxrdError::Singular(e.to_string()))?;
    let inverse = svd
        .pseudo_inverse(eps)
        .map_err(|e| PxrdError::Singular(e.to_string()))?;

    Ok(Solution {
        x: x.iter().copied().collect(),
        inverse,
    })
}

/// 最小二乘 `min ‖M·x − y‖`，`M` 为 n×p（n ≥ p）
pub fn least_squares(m: DMatrix<f64>, y: &[f64]) -> Result<Vec<f64>> {
    if m.nrows() != y.len() {
        return Err(PxrdError::LengthMismatch {
            what: "least squares rhs".to_string(),
            expected: m.nrows(),
            found: y.len(),
        });
    }
    if m.nrows() < m.ncols() {
        return Err(PxrdError::Singular(format!(
            "{} equations for {} unknowns",
            m.nrows(),
            m.ncols()
        )));
    }

    let svd = m.svd(true, true);
    let s_max = svd.singular_values.max();
    let s_min = svd.singular_values.min();
    if !(s_max > 0.0) || s_min / s_max < RCOND_LIMIT {
        return Err(PxrdError::Singular(
            "design matrix is rank deficient".to_string(),
        ));
    }
    let rhs = DVector::from_column_slice(y);
    let x = svd
        .solve(&rhs, s_max * RCOND_LIMIT)
        .map_err(|e| PxrdError::Singular(e.to_string()))?;
    Ok(x.iter().copied().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_2x2() {
        let a = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 3.0]);
        let sol = solve_with_inverse(a, &[3.0, 5.0]).unwrap();
        assert!((sol.x[0] - 0.8).abs() < 1e-12);
        assert!((sol.x[1] - 1.4).abs() < 1e-12);
        // A⁻¹ = 1/5 [[3, -1], [-1, 2]]
        assert!((sol.inverse[(0, 0)] - 0.6).abs() < 1e-12);
        assert!((sol.inverse[(0, 1)] + 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_singular_is_error() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        let err = solve_with_inverse(a, &[1.0, 2.0]).unwrap_err();
        assert!(err.is_numerical());

        let zero = DMatrix::zeros(1, 1);
        assert!(solve_with_inverse(zero, &[0.0]).is_err());
    }

    #[test]
    fn test_least_squares_line() {
        let m = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let x = least_squares(m, &[1.0, 3.0, 5.0]).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
    }
}
