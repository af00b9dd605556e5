//! # 背景估计
//!
//! 带迭代剔除的稳健多项式背景拟合：
//! 1. 对全部点做 d 阶最小二乘，`σ² = Σ(y − fit)² / (n − 1 − d)`
//! 2. 保留 `y − fit < σ·k` 的点（单侧：峰在背景之上），重新拟合
//! 3. 在保留点上重新计算 σ²，直到 σ² 的相对变化小于容差
//!
//! ## 依赖关系
//! - 被 `peaks/search.rs`、CLI `peaks` 命令使用
//! - 使用 `numeric/poly.rs`

use crate::error::{ensure_same_len, PxrdError, Result};
use crate::numeric::poly::{polyfit, Polynomial};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// 背景拟合参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundOptions {
    /// 多项式阶数
    pub degree: usize,
    /// 剔除阈值的 σ 倍数 k
    pub sigma_multiplier: f64,
    /// σ² 相对变化小于该值即认为收敛
    pub relative_tolerance: f64,
    pub max_iterations: usize,
}

impl Default for BackgroundOptions {
    fn default() -> Self {
        Self {
            degree: 2,
            sigma_multiplier: 2.0,
            relative_tolerance: 1e-10,
            max_iterations: 100,
        }
    }
}

/// 背景模型（生成后不再修改）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundModel {
    /// 关于 x 的升幂系数
    pub coefficients: Vec<f64>,
    pub degree: usize,
    /// 保留点上的残差方差
    pub sigma2: f64,
    /// 背景在每个 x 上的值
    pub values: Vec<f64>,
    /// 最后一轮是否保留该点
    pub inliers: Vec<bool>,
    pub iterations: usize,
    pub converged: bool,
    polynomial: Polynomial,
}

impl BackgroundModel {
    /// 在任意 x 处求背景值
    pub fn eval(&self, x: f64) -> f64 {
        self.polynomial.eval(x)
    }

    /// 扣除背景后的强度 `y − background`
    pub fn stripped(&self, y: &[f64]) -> Result<Vec<f64>> {
        ensure_same_len("stripped y", self.values.len(), y.len())?;
        Ok(y.iter().zip(&self.values).map(|(a, b)| a - b).collect())
    }

    pub fn rejected_count(&self) -> usize {
        self.inliers.iter().filter(|&&keep| !keep).count()
    }
}

fn residual_variance(x: &[f64], y: &[f64], poly: &Polynomial, degree: usize) -> f64 {
    let ss: f64 = x
        .iter()
        .zip(y)
        .map(|(&xi, &yi)| {
            let r = yi - poly.eval(xi);
            r * r
        })
        .sum();
    ss / (x.len() as f64 - 1.0 - degree as f64)
}

/// 估计背景
pub fn estimate_background(
    x: &[f64],
    y: &[f64],
    options: &BackgroundOptions,
) -> Result<BackgroundModel> {
    ensure_same_len("background y", x.len(), y.len())?;
    if x.is_empty() {
        return Err(PxrdError::EmptyInput("background pattern".to_string()));
    }
    let k = options.sigma_multiplier;
    if !(k.is_finite() && k > 0.0) {
        return Err(PxrdError::InvalidInput(format!(
            "sigma multiplier must be positive, got {}",
            k
        )));
    }
    let degree = options.degree;
    // σ² 的分母 n − 1 − d 必须为正
    if x.len() < degree + 2 {
        return Err(PxrdError::DegreeTooHigh {
            degree,
            points: x.len(),
        });
    }

    let mut poly = polyfit(x, y, degree)?;
    let mut sigma2 = residual_variance(x, y, &poly, degree);
    let mut inliers = vec![true; x.len()];
    let mut iterations = 0;
    let mut converged = sigma2 == 0.0;

    while !converged && iterations < options.max_iterations {
        iterations += 1;
        let threshold = sigma2.sqrt() * k;
        inliers = x
            .iter()
            .zip(y)
            .map(|(&xi, &yi)| yi - poly.eval(xi) < threshold)
            .collect();

        let (kx, ky): (Vec<f64>, Vec<f64>) = x
            .iter()
            .zip(y)
            .zip(&inliers)
            .filter(|(_, &keep)| keep)
            .map(|((&a, &b), _)| (a, b))
            .unzip();
        if kx.len() < degree + 2 {
            return Err(PxrdError::Unsolvable(format!(
                "background rejection left {} of {} points for degree {}",
                kx.len(),
                x.len(),
                degree
            )));
        }

        poly = polyfit(&kx, &ky, degree)?;
        let previous = sigma2;
        sigma2 = residual_variance(&kx, &ky, &poly, degree);
        debug!(
            "background round {}: kept {}/{} points, sigma2 {:.6e} -> {:.6e}",
            iterations,
            kx.len(),
            x.len(),
            previous,
            sigma2
        );
        converged = sigma2 == 0.0
            || (sigma2 - previous).abs() <= options.relative_tolerance * previous.abs();
    }

    if !converged {
        warn!(
            "background fit stopped after {} rounds without reaching a fixed point",
            iterations
        );
    }

    Ok(BackgroundModel {
        coefficients: poly.raw_coefficients(),
        degree,
        sigma2,
        values: poly.eval_all(x),
        inliers,
        iterations,
        converged,
        polynomial: poly,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn baseline(x: f64) -> f64 {
        50.0 - 0.3 * x + 0.002 * x * x
    }

    fn noisy_pattern(seed: u64) -> (Vec<f64>, Vec<f64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let x: Vec<f64> = (0..200).map(|i| 10.0 + i as f64 * 0.4).collect();
        let y = x
            .iter()
            .map(|&v| baseline(v) + rng.gen_range(-0.5..0.5))
            .collect();
        (x, y)
    }

    #[test]
    fn test_noise_only_keeps_every_point() {
        let (x, y) = noisy_pattern(7);
        let options = BackgroundOptions {
            sigma_multiplier: 3.0,
            ..Default::default()
        };
        let bg = estimate_background(&x, &y, &options).unwrap();
        assert_eq!(bg.rejected_count(), 0);
        assert!(bg.converged);

        let plain = polyfit(&x, &y, 2).unwrap();
        for (xi, v) in x.iter().zip(&bg.values) {
            assert!((plain.eval(*xi) - v).abs() < 1e-9);
        }
    }

    #[test]
    fn test_spikes_are_excluded() {
        let (x, mut y) = noisy_pattern(11);
        let spikes = [20, 21, 22, 90, 150, 151];
        for &i in &spikes {
            y[i] += 40.0;
        }
        let bg = estimate_background(&x, &y, &BackgroundOptions::default()).unwrap();
        for &i in &spikes {
            assert!(!bg.inliers[i], "spike at {} was kept", i);
        }
        for (xi, v) in x.iter().zip(&bg.values) {
            assert!((baseline(*xi) - v).abs() < 0.5);
        }
        let stripped = bg.stripped(&y).unwrap();
        assert!(stripped[90] > 35.0);
    }

    #[test]
    fn test_input_contract() {
        let opts = BackgroundOptions::default();
        assert!(estimate_background(&[1.0, 2.0], &[1.0], &opts)
            .unwrap_err()
            .is_contract_violation());
        assert!(matches!(
            estimate_background(&[], &[], &opts),
            Err(PxrdError::EmptyInput(_))
        ));
        assert_eq!(
            estimate_background(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0], &opts).unwrap_err(),
            PxrdError::DegreeTooHigh {
                degree: 2,
                points: 3
            }
        );
        let bad_k = BackgroundOptions {
            sigma_multiplier: 0.0,
            ..Default::default()
        };
        assert!(estimate_background(&[1.0, 2.0, 3.0, 4.0], &[1.0; 4], &bad_k).is_err());
    }

    #[test]
    fn test_exact_polynomial_is_fixed_point() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y = vec![5.0; 10];
        let opts = BackgroundOptions {
            degree: 0,
            ..Default::default()
        };
        let bg = estimate_background(&x, &y, &opts).unwrap();
        assert!(bg.sigma2 < 1e-20);
        assert_eq!(bg.rejected_count(), 0);
        assert!(bg.converged);
        assert!((bg.eval(3.0) - 5.0).abs() < 1e-12);
    }
}
