//! # 正向模型：由晶胞计算 d 值
//!
//! 对任意晶系使用倒易度规张量 `G* = G⁻¹`：`1/d² = hᵀ·G*·h`。
//! 晶系未使用的参数按对称性补齐（如立方 b = c = a，菱方 α = β = γ）。
//!
//! ## 依赖关系
//! - 被 `cell/refine.rs` 的测试、CLI `cell` 命令使用
//! - 使用 `nalgebra` 的 3×3 矩阵求逆

use crate::error::{PxrdError, Result};
use crate::models::{CellModel, CrystalSystem, Miller, Reflection};

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 点阵类型（决定系统消光）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Centering {
    #[default]
    P,
    I,
    A,
    B,
    C,
    F,
}

impl Centering {
    /// 该衍射是否允许出现
    pub fn allows(self, m: &Miller) -> bool {
        let (h, k, l) = (m.h, m.k, m.l);
        match self {
            Centering::P => true,
            Centering::I => (h + k + l) % 2 == 0,
            Centering::A => (k + l) % 2 == 0,
            Centering::B => (h + l) % 2 == 0,
            Centering::C => (h + k) % 2 == 0,
            Centering::F => {
                let parity = [h, k, l].map(|v| v.rem_euclid(2));
                parity.iter().all(|&p| p == parity[0])
            }
        }
    }
}

impl FromStr for Centering {
    type Err = PxrdError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "P" => Ok(Centering::P),
            "I" => Ok(Centering::I),
            "A" => Ok(Centering::A),
            "B" => Ok(Centering::B),
            "C" => Ok(Centering::C),
            "F" => Ok(Centering::F),
            _ => Err(PxrdError::Unsupported(format!("lattice centering '{}'", s))),
        }
    }
}

impl CellModel {
    /// 六个晶格常数（角度为度），按晶系补齐
    pub fn full_parameters(&self) -> [f64; 6] {
        let a = self.a;
        let b = self.b.unwrap_or(a);
        let c = self.c.unwrap_or(match self.system {
            CrystalSystem::Cubic | CrystalSystem::Rhombohedral => a,
            _ => f64::NAN,
        });
        match self.system {
            CrystalSystem::Rhombohedral => {
                let alpha = self.alpha.unwrap_or(90.0);
                [a, a, a, alpha, alpha, alpha]
            }
            _ => [
                a,
                b,
                c,
                self.alpha.unwrap_or(90.0),
                self.beta.unwrap_or(90.0),
                self.gamma.unwrap_or(90.0),
            ],
        }
    }

    /// 倒易度规张量
    pub fn reciprocal_metric(&self) -> Result<Matrix3<f64>> {
        let [a, b, c, alpha, beta, gamma] = self.full_parameters();
        if ![a, b, c].iter().all(|v| v.is_finite() && *v > 0.0) {
            return Err(PxrdError::InvalidInput(format!(
                "{} cell has non-positive or missing lengths",
                self.system
            )));
        }
        let (ca, cb, cg) = (
            alpha.to_radians().cos(),
            beta.to_radians().cos(),
            gamma.to_radians().cos(),
        );
        let g = Matrix3::new(
            a * a,
            a * b * cg,
            a * c * cb,
            a * b * cg,
            b * b,
            b * c * ca,
            a * c * cb,
            b * c * ca,
            c * c,
        );
        g.try_inverse().ok_or_else(|| {
            PxrdError::Singular(format!("{} cell has a degenerate metric", self.system))
        })
    }

    /// `1/d²`
    pub fn inverse_d_squared(&self, hkl: Miller) -> Result<f64> {
        let g = self.reciprocal_metric()?;
        let (h, k, l) = hkl.as_f64();
        let v = Vector3::new(h, k, l);
        Ok((v.transpose() * g * v)[(0, 0)])
    }

    pub fn d_spacing(&self, hkl: Miller) -> Result<f64> {
        if hkl.is_origin() {
            return Err(PxrdError::InvalidInput(
                "reflection (0 0 0) has no d-spacing".to_string(),
            ));
        }
        Ok(self.inverse_d_squared(hkl)?.powf(-0.5))
    }
}

/// 生成 |h|, |k|, |l| ≤ `max_index` 的所有允许衍射
///
/// 相同 d 值只保留一个代表指标，结果按 d 降序。
pub fn generate_reflections(
    cell: &CellModel,
    max_index: i32,
    centering: Centering,
) -> Result<Vec<Reflection>> {
    let g = cell.reciprocal_metric()?;
    let mut all = Vec::new();
    for h in -max_index..=max_index {
        for k in -max_index..=max_index {
            for l in -max_index..=max_index {
                let m = Miller::new(h, k, l);
                if m.is_origin() || !centering.allows(&m) {
                    continue;
                }
                let v = Vector3::new(h as f64, k as f64, l as f64);
                let q = (v.transpose() * g * v)[(0, 0)];
                all.push(Reflection::new(q.powf(-0.5), m));
            }
        }
    }

    // d 降序；相同 d 时把指标较大的排在前面作为代表
    all.sort_by(|x, y| y.d.total_cmp(&x.d).then(y.hkl.cmp(&x.hkl)));
    all.dedup_by(|later, kept| (later.d - kept.d).abs() <= 1e-9 * kept.d);
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cubic_d_spacing() {
        let cell = CellModel::cubic(4.0);
        assert!((cell.d_spacing(Miller::new(1, 1, 1)).unwrap() - 4.0 / 3f64.sqrt()).abs() < 1e-12);
        assert!((cell.d_spacing(Miller::new(2, 0, 0)).unwrap() - 2.0).abs() < 1e-12);
        assert!(cell.d_spacing(Miller::new(0, 0, 0)).is_err());
    }

    #[test]
    fn test_hexagonal_quadratic_form() {
        let cell = CellModel::hexagonal(3.0, 5.0);
        let m = Miller::new(1, 1, 2);
        let expected = 4.0 / (3.0 * 9.0) * 3.0 + 4.0 / 25.0;
        assert!((cell.inverse_d_squared(m).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_centering_extinctions() {
        assert!(Centering::I.allows(&Miller::new(1, 1, 0)));
        assert!(!Centering::I.allows(&Miller::new(1, 0, 0)));
        assert!(Centering::F.allows(&Miller::new(1, 1, 1)));
        assert!(Centering::F.allows(&Miller::new(2, 0, 0)));
        assert!(!Centering::F.allows(&Miller::new(1, 1, 0)));
        assert!(Centering::F.allows(&Miller::new(-1, 1, 1)));
        assert!(!Centering::C.allows(&Miller::new(1, 0, 1)));
        assert!("f".parse::<Centering>().unwrap() == Centering::F);
        assert!("R".parse::<Centering>().unwrap_err().is_unsupported());
    }

    #[test]
    fn test_fcc_reflection_sequence() {
        let cell = CellModel::cubic(4.0);
        let refl = generate_reflections(&cell, 3, Centering::F).unwrap();
        let sums: Vec<i32> = refl
            .iter()
            .take(4)
            .map(|r| r.hkl.h * r.hkl.h + r.hkl.k * r.hkl.k + r.hkl.l * r.hkl.l)
            .collect();
        // (111), (200), (220), (311)
        assert_eq!(sums, vec![3, 4, 8, 11]);
        assert!(refl.windows(2).all(|w| w[0].d > w[1].d));
        assert_eq!(refl[0].hkl, Miller::new(1, 1, 1));

        // 指标上限为 2 时 (311) 不会出现，第四条是 (222)
        let capped = generate_reflections(&cell, 2, Centering::F).unwrap();
        let fourth = capped[3].hkl;
        assert_eq!(fourth.h * fourth.h + fourth.k * fourth.k + fourth.l * fourth.l, 12);
    }
}
