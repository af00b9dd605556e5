//! # 晶胞参数精修
//!
//! 每个晶系把 `Q = 1/d²` 写成 (h, k, l) 的二次型，系数与晶格常数一一对应：
//!
//! | 晶系 | 线性形式 |
//! |------|----------|
//! | cubic | `A(h²+k²+l²)` |
//! | tetragonal | `A(h²+k²) + C·l²` |
//! | hexagonal | `A(h²+hk+k²) + C·l²`，`A = 4/(3a²)` |
//! | orthorhombic | `A·h² + B·k² + C·l²` |
//! | rhombohedral | `P(h²+k²+l²) + R(hk+kl+hl)` |
//! | monoclinic（b 唯一轴） | `A·h² + B·k² + C·l² + E·hl` |
//!
//! 由基函数乘积的平均值构成法方程，求解系数后反算晶格常数。
//! `chi²` 为 Q 残差的均方；方差按 `chi²·(N⁻¹)ⱼⱼ` 经 delta 方法传播。
//!
//! ## 依赖关系
//! - 被 `cell/angle.rs`、CLI `cell` 命令使用
//! - 使用 `numeric/linalg.rs` 求解法方程

use crate::error::{PxrdError, Result};
use crate::models::{CellModel, CellVariances, CrystalSystem, IndexAssignment, Miller, Reflection};
use crate::numeric::linalg::solve_with_inverse;

use log::debug;
use nalgebra::DMatrix;

/// 晶系对应的基函数
fn basis(system: CrystalSystem, m: &Miller) -> Vec<f64> {
    let (h, k, l) = m.as_f64();
    match system {
        CrystalSystem::Cubic => vec![h * h + k * k + l * l],
        CrystalSystem::Tetragonal => vec![h * h + k * k, l * l],
        CrystalSystem::Hexagonal => vec![h * h + h * k + k * k, l * l],
        CrystalSystem::Orthorhombic => vec![h * h, k * k, l * l],
        CrystalSystem::Rhombohedral => vec![h * h + k * k + l * l, h * k + k * l + h * l],
        CrystalSystem::Monoclinic => vec![h * h, k * k, l * l, h * l],
    }
}

/// 由 (d, hkl) 反射表精修晶胞
pub fn refine_cell(system: CrystalSystem, reflections: &[Reflection]) -> Result<CellModel> {
    let p = system.parameter_count();
    if reflections.is_empty() {
        return Err(PxrdError::EmptyInput("reflection table".to_string()));
    }
    for r in reflections {
        if !(r.d.is_finite() && r.d > 0.0) {
            return Err(PxrdError::InvalidInput(format!(
                "d-spacing must be positive, got {} for {}",
                r.d, r.hkl
            )));
        }
        if r.hkl.is_origin() {
            return Err(PxrdError::InvalidInput(
                "reflection (0 0 0) has no d-spacing".to_string(),
            ));
        }
    }
    if reflections.len() < p {
        return Err(PxrdError::Singular(format!(
            "{} reflection(s) for {} unknowns of a {} cell",
            reflections.len(),
            p,
            system
        )));
    }

    let n = reflections.len() as f64;
    let rows: Vec<(f64, Vec<f64>)> = reflections
        .iter()
        .map(|r| (r.d.powi(-2), basis(system, &r.hkl)))
        .collect();

    let normal = DMatrix::from_fn(p, p, |i, j| {
        rows.iter().map(|(_, b)| b[i] * b[j]).sum::<f64>() / n
    });
    let rhs: Vec<f64> = (0..p)
        .map(|i| rows.iter().map(|(q, b)| q * b[i]).sum::<f64>() / n)
        .collect();
    let solution = solve_with_inverse(normal, &rhs)?;
    let coef = &solution.x;

    let chi2 = rows
        .iter()
        .map(|(q, b)| {
            let fit: f64 = b.iter().zip(coef).map(|(bi, ci)| bi * ci).sum();
            (q - fit) * (q - fit)
        })
        .sum::<f64>()
        / n;
    let coef_var = |j: usize| chi2 * solution.inverse[(j, j)];
    debug!("{} coefficients {:?}, chi2 {:.3e}", system, coef, chi2);

    let mut cell = match system {
        CrystalSystem::Cubic => {
            let a = inverse_sqrt(coef[0], "A")?;
            let mut cell = CellModel::cubic(a);
            cell.variances.a = Some(inverse_sqrt_variance(coef[0], coef_var(0)));
            cell
        }
        CrystalSystem::Tetragonal => {
            let a = inverse_sqrt(coef[0], "A")?;
            let c = inverse_sqrt(coef[1], "C")?;
            let mut cell = CellModel::tetragonal(a, c);
            cell.variances.a = Some(inverse_sqrt_variance(coef[0], coef_var(0)));
            cell.variances.c = Some(inverse_sqrt_variance(coef[1], coef_var(1)));
            cell
        }
        CrystalSystem::Hexagonal => {
            // a = (4/3)^½ · A^-½
            let a = (4.0f64 / 3.0).sqrt() * inverse_sqrt(coef[0], "A")?;
            let c = inverse_sqrt(coef[1], "C")?;
            let mut cell = CellModel::hexagonal(a, c);
            cell.variances.a = Some(4.0 / 3.0 * inverse_sqrt_variance(coef[0], coef_var(0)));
            cell.variances.c = Some(inverse_sqrt_variance(coef[1], coef_var(1)));
            cell
        }
        CrystalSystem::Orthorhombic => {
            let a = inverse_sqrt(coef[0], "A")?;
            let b = inverse_sqrt(coef[1], "B")?;
            let c = inverse_sqrt(coef[2], "C")?;
            let mut cell = CellModel::orthorhombic(a, b, c);
            cell.variances = CellVariances {
                a: Some(inverse_sqrt_variance(coef[0], coef_var(0))),
                b: Some(inverse_sqrt_variance(coef[1], coef_var(1))),
                c: Some(inverse_sqrt_variance(coef[2], coef_var(2))),
                ..Default::default()
            };
            cell
        }
        CrystalSystem::Rhombohedral => rhombohedral(coef[0], coef[1])?,
        CrystalSystem::Monoclinic => {
            let mut cell = monoclinic(coef[0], coef[1], coef[2], coef[3])?;
            cell.variances.b = Some(inverse_sqrt_variance(coef[1], coef_var(1)));
            cell
        }
    };
    cell.chi2 = chi2;
    Ok(cell)
}

/// `x^-½`，要求 x > 0
fn inverse_sqrt(x: f64, name: &str) -> Result<f64> {
    if !(x > 0.0 && x.is_finite()) {
        return Err(PxrdError::Unsolvable(format!(
            "coefficient {} = {:.6e} is not positive",
            name, x
        )));
    }
    Ok(x.powf(-0.5))
}

/// `a = x^-½` 时 `var(a) = var(x) / (4x³)`
fn inverse_sqrt_variance(x: f64, var_x: f64) -> f64 {
    var_x / (4.0 * x.powi(3))
}

/// `Q = P(h²+k²+l²) + R(hk+kl+hl)`：`cos α = −ρ/(ρ+2)`，`ρ = R/P`
fn rhombohedral(p: f64, r: f64) -> Result<CellModel> {
    if !(p > 0.0) {
        return Err(PxrdError::Unsolvable(format!(
            "rhombohedral coefficient P = {:.6e} is not positive",
            p
        )));
    }
    let rho = r / p;
    let cos = -rho / (rho + 2.0);
    if !(cos > -0.5 && cos < 1.0) {
        return Err(PxrdError::Unsolvable(format!(
            "rhombohedral angle out of range (cos α = {:.6})",
            cos
        )));
    }
    let a = ((1.0 + cos) / (p * (1.0 - cos) * (1.0 + 2.0 * cos))).sqrt();
    Ok(CellModel::rhombohedral(a, cos.acos().to_degrees()))
}

/// `Q = A·h² + B·k² + C·l² + E·hl`：`cos β = −E / (2√(AC))`
fn monoclinic(a2: f64, b2: f64, c2: f64, e: f64) -> Result<CellModel> {
    let b = inverse_sqrt(b2, "B")?;
    if !(a2 > 0.0 && c2 > 0.0) {
        return Err(PxrdError::Unsolvable(format!(
            "monoclinic coefficients A = {:.6e}, C = {:.6e} must be positive",
            a2, c2
        )));
    }
    let cos = -e / (2.0 * (a2 * c2).sqrt());
    if !(cos.abs() < 1.0) {
        return Err(PxrdError::Unsolvable(format!(
            "monoclinic angle out of range (cos β = {:.6})",
            cos
        )));
    }
    let sin2 = 1.0 - cos * cos;
    let a = 1.0 / (a2 * sin2).sqrt();
    let c = 1.0 / (c2 * sin2).sqrt();
    Ok(CellModel::monoclinic(a, b, c, cos.acos().to_degrees()))
}

/// 按指标化结果取出 (d, hkl)；`d_spacings[i]` 对应峰序号 i
pub fn reflections_from_assignment(
    d_spacings: &[f64],
    assignment: &IndexAssignment,
) -> Result<Vec<Reflection>> {
    assignment
        .iter()
        .map(|(&i, &hkl)| {
            d_spacings
                .get(i)
                .map(|&d| Reflection::new(d, hkl))
                .ok_or_else(|| {
                    PxrdError::InvalidInput(format!(
                        "peak {} is indexed but only {} peaks exist",
                        i,
                        d_spacings.len()
                    ))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn hkl_grid() -> Vec<Miller> {
        let mut out = Vec::new();
        for h in 0..=4 {
            for k in 0..=4 {
                for l in 0..=4 {
                    let m = Miller::new(h, k, l);
                    if !m.is_origin() {
                        out.push(m);
                    }
                }
            }
        }
        out
    }

    /// 加入 h < 0 的反射：单斜晶系中 (h k l) 与 (−h k l) 不等价
    fn signed_grid() -> Vec<Miller> {
        let mut out = hkl_grid();
        out.extend(
            hkl_grid()
                .into_iter()
                .filter(|m| m.h > 0 && m.l > 0)
                .map(|m| Miller::new(-m.h, m.k, m.l)),
        );
        out
    }

    fn synthesize(cell: &CellModel, grid: &[Miller]) -> Vec<Reflection> {
        grid.iter()
            .map(|&m| Reflection::new(cell.d_spacing(m).unwrap(), m))
            .collect()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn test_exact_recovery_for_every_system() {
        let truths = [
            CellModel::cubic(3.2),
            CellModel::tetragonal(3.1, 5.1),
            CellModel::hexagonal(3.1, 5.2),
            CellModel::orthorhombic(3.0, 4.0, 5.0),
            CellModel::rhombohedral(5.0, 70.0),
            CellModel::monoclinic(5.0, 6.0, 7.0, 100.0),
        ];
        for truth in &truths {
            let refl = synthesize(truth, &signed_grid());
            let fit = refine_cell(truth.system, &refl).unwrap();
            assert_eq!(fit.system, truth.system);
            assert!(fit.chi2 < 1e-20, "{}: chi2 {}", truth.system, fit.chi2);
            let pairs = [
                (Some(fit.a), Some(truth.a)),
                (fit.b, truth.b),
                (fit.c, truth.c),
                (fit.alpha, truth.alpha),
                (fit.beta, truth.beta),
                (fit.gamma, truth.gamma),
            ];
            for (got, want) in pairs {
                match (got, want) {
                    (Some(g), Some(w)) => assert!(close(g, w), "{}: {} vs {}", truth.system, g, w),
                    (None, None) => {}
                    other => panic!("{}: slot mismatch {:?}", truth.system, other),
                }
            }
        }
    }

    #[test]
    fn test_chi2_matches_refined_model() {
        let mut rng = StdRng::seed_from_u64(42);
        let truth = CellModel::orthorhombic(3.0, 4.0, 5.0);
        let refl: Vec<Reflection> = synthesize(&truth, &hkl_grid())
            .into_iter()
            .map(|r| Reflection::new(r.d * (1.0 + rng.gen_range(-1e-3..1e-3)), r.hkl))
            .collect();
        let fit = refine_cell(CrystalSystem::Orthorhombic, &refl).unwrap();
        let recomputed = refl
            .iter()
            .map(|r| {
                let dq = r.d.powi(-2) - fit.inverse_d_squared(r.hkl).unwrap();
                dq * dq
            })
            .sum::<f64>()
            / refl.len() as f64;
        assert!(fit.chi2 > 0.0);
        assert!((fit.chi2 - recomputed).abs() <= 1e-9 * fit.chi2);
    }

    #[test]
    fn test_hexagonal_variance_covers_error() {
        let mut rng = StdRng::seed_from_u64(3);
        let truth = CellModel::hexagonal(3.1, 5.2);
        let refl: Vec<Reflection> = synthesize(&truth, &hkl_grid())
            .into_iter()
            .map(|r| Reflection::new(r.d * (1.0 + rng.gen_range(-5e-4..5e-4)), r.hkl))
            .collect();
        let fit = refine_cell(CrystalSystem::Hexagonal, &refl).unwrap();
        let var_a = fit.variances.a.unwrap();
        let var_c = fit.variances.c.unwrap();
        assert!((fit.a - 3.1).powi(2) <= var_a, "{} vs {}", fit.a, var_a);
        assert!((fit.c.unwrap() - 5.2).powi(2) <= var_c);
        assert_eq!(fit.gamma, Some(120.0));
    }

    #[test]
    fn test_singular_systems() {
        // l 全为 0：C 无法确定
        let flat: Vec<Reflection> = [(1, 0, 0), (1, 1, 0), (2, 0, 0), (2, 1, 0)]
            .iter()
            .map(|&(h, k, l)| {
                let m = Miller::new(h, k, l);
                Reflection::new(CellModel::tetragonal(3.0, 5.0).d_spacing(m).unwrap(), m)
            })
            .collect();
        let err = refine_cell(CrystalSystem::Tetragonal, &flat).unwrap_err();
        assert!(err.is_numerical(), "{:?}", err);

        let err = refine_cell(CrystalSystem::Orthorhombic, &flat[..2]).unwrap_err();
        assert!(matches!(err, PxrdError::Singular(_)));
    }

    #[test]
    fn test_invalid_rows() {
        let bad = [Reflection::new(-1.0, Miller::new(1, 0, 0))];
        assert!(refine_cell(CrystalSystem::Cubic, &bad)
            .unwrap_err()
            .is_contract_violation());
        let origin = [Reflection::new(1.0, Miller::new(0, 0, 0))];
        assert!(refine_cell(CrystalSystem::Cubic, &origin).is_err());
        assert!(refine_cell(CrystalSystem::Cubic, &[]).is_err());
    }

    #[test]
    fn test_reflections_from_assignment() {
        let mut assignment = IndexAssignment::new();
        assignment.insert(0, Miller::new(1, 0, 0));
        assignment.insert(2, Miller::new(1, 1, 1));
        let refl = reflections_from_assignment(&[4.0, 3.0, 2.3], &assignment).unwrap();
        assert_eq!(refl.len(), 2);
        assert_eq!(refl[1].d, 2.3);

        assignment.insert(7, Miller::new(2, 0, 0));
        assert!(reflections_from_assignment(&[4.0, 3.0, 2.3], &assignment).is_err());
    }
}
