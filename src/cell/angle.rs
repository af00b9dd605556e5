//! # 由指标化结果校正仪器角度
//!
//! 用三次多项式 `θ' = c₀ + c₁θ + c₂θ² + c₃θ³` 修正测得的衍射角，
//! 使指定晶系的晶胞精修残差最小。起点是恒等变换 `[0, 1, 0, 0]`。
//!
//! 直接最小化 `chi²` 会让所有角度一起缩小（d 变大、Q 变小），
//! 因此目标函数使用 `chi² / mean(Q²)`，报告的仍是原始 `chi²`。
//!
//! ## 依赖关系
//! - 被 CLI `cell --fix-angle` 使用
//! - 使用 `cell/refine.rs` 精修晶胞，`numeric/` 的多项式与优化器

use crate::cell::refine::{reflections_from_assignment, refine_cell};
use crate::error::{PxrdError, Result};
use crate::models::{CellModel, CrystalSystem, IndexAssignment, Reflection};
use crate::numeric::{mean, polyval, Minimizer};

use log::debug;
use serde::Serialize;

/// 恒等变换（升幂系数）
pub const IDENTITY: [f64; 4] = [0.0, 1.0, 0.0, 0.0];

/// 角度校正结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AngleFix {
    /// 升幂系数，作用于 θ（弧度）
    pub coefficients: Vec<f64>,
    pub chi2_before: f64,
    pub chi2_after: f64,
    /// 校正后精修得到的晶胞
    pub cell: CellModel,
}

struct AngleModel<'a> {
    theta: Vec<f64>,
    wavelength: f64,
    system: CrystalSystem,
    assignment: &'a IndexAssignment,
}

impl AngleModel<'_> {
    /// 校正后的反射表；峰序号按 d 降序（即 sinθ 升序）计
    fn reflections(&self, coefficients: &[f64]) -> Result<Vec<Reflection>> {
        let mut d = Vec::with_capacity(self.theta.len());
        for &t in &self.theta {
            let s = polyval(coefficients, t).sin();
            if !(s > 0.0) {
                return Err(PxrdError::Unsolvable(format!(
                    "corrected sin(θ) = {:.6} is not positive",
                    s
                )));
            }
            d.push(self.wavelength / (2.0 * s));
        }
        d.sort_by(|a, b| b.total_cmp(a));
        reflections_from_assignment(&d, self.assignment)
    }

    fn refine(&self, coefficients: &[f64]) -> Result<CellModel> {
        refine_cell(self.system, &self.reflections(coefficients)?)
    }

    fn objective(&self, coefficients: &[f64]) -> f64 {
        let refl = match self.reflections(coefficients) {
            Ok(r) => r,
            Err(_) => return f64::INFINITY,
        };
        let q2: Vec<f64> = refl.iter().map(|r| r.d.powi(-4)).collect();
        match refine_cell(self.system, &refl) {
            Ok(cell) => cell.chi2 / mean(&q2),
            Err(_) => f64::INFINITY,
        }
    }
}

/// 寻找使晶胞残差最小的角度校正多项式
pub fn fix_angle(
    sin_theta: &[f64],
    wavelength: f64,
    system: CrystalSystem,
    assignment: &IndexAssignment,
    minimizer: &dyn Minimizer,
) -> Result<AngleFix> {
    if sin_theta.is_empty() {
        return Err(PxrdError::EmptyInput("peak positions".to_string()));
    }
    if !(wavelength > 0.0 && wavelength.is_finite()) {
        return Err(PxrdError::InvalidInput(format!(
            "wavelength must be positive, got {}",
            wavelength
        )));
    }
    if let Some(s) = sin_theta.iter().find(|s| !(**s > 0.0 && **s < 1.0)) {
        return Err(PxrdError::InvalidInput(format!(
            "sin(θ) must lie in (0, 1), got {}",
            s
        )));
    }

    let model = AngleModel {
        theta: sin_theta.iter().map(|s| s.asin()).collect(),
        wavelength,
        system,
        assignment,
    };
    let before = model.refine(&IDENTITY)?;

    let best = minimizer.minimize(&|c: &[f64]| model.objective(c), &IDENTITY);
    debug!(
        "angle polynomial {:?} after {} evaluations (converged: {})",
        best.x, best.evaluations, best.converged
    );
    let cell = model.refine(&best.x)?;

    Ok(AngleFix {
        coefficients: best.x,
        chi2_before: before.chi2,
        chi2_after: cell.chi2,
        cell,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::forward::{generate_reflections, Centering};
    use crate::models::Miller;
    use crate::numeric::NelderMead;

    const LAMBDA: f64 = 1.5406;

    /// 立方 a = 4 Å 的前 6 条衍射，θ 整体偏移 `shift`
    fn shifted(shift: f64) -> (Vec<f64>, IndexAssignment) {
        let cell = CellModel::cubic(4.0);
        let refl = generate_reflections(&cell, 2, Centering::P).unwrap();
        let mut sin_theta = Vec::new();
        let mut assignment = IndexAssignment::new();
        for (i, r) in refl.iter().take(6).enumerate() {
            let theta = (LAMBDA / (2.0 * r.d)).asin() + shift;
            sin_theta.push(theta.sin());
            assignment.insert(i, r.hkl);
        }
        (sin_theta, assignment)
    }

    #[test]
    fn test_identity_keeps_exact_data() {
        let (s, assignment) = shifted(0.0);
        let fix = fix_angle(&s, LAMBDA, CrystalSystem::Cubic, &assignment, &NelderMead::default())
            .unwrap();
        assert!(fix.chi2_before < 1e-20);
        assert!((fix.cell.a - 4.0).abs() < 1e-3);
    }

    #[test]
    fn test_zero_shift_is_reduced() {
        let (s, assignment) = shifted(0.003);
        let fix = fix_angle(&s, LAMBDA, CrystalSystem::Cubic, &assignment, &NelderMead::default())
            .unwrap();
        assert!(fix.chi2_before > 0.0);
        assert!(fix.chi2_after < fix.chi2_before * 0.05);
        assert_eq!(fix.coefficients.len(), 4);
    }

    #[test]
    fn test_invalid_inputs() {
        let mut assignment = IndexAssignment::new();
        assignment.insert(0, Miller::new(1, 0, 0));
        let nm = NelderMead::default();
        let sys = CrystalSystem::Cubic;
        assert!(fix_angle(&[], LAMBDA, sys, &assignment, &nm).is_err());
        assert!(fix_angle(&[0.2], -1.0, sys, &assignment, &nm).is_err());
        assert!(fix_angle(&[1.2], LAMBDA, sys, &assignment, &nm).is_err());

        assignment.insert(5, Miller::new(1, 1, 0));
        let err = fix_angle(&[0.2, 0.3], LAMBDA, sys, &assignment, &nm).unwrap_err();
        assert!(err.is_contract_violation());
    }
}
