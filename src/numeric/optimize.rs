//! # 无导数优化器
//!
//! 峰分解与指标搜索只通过 `Minimizer` 接口调用优化器，
//! 数值后端（Nelder–Mead 单纯形、Powell 共轭方向）可以互换。
//!
//! 约定：目标函数返回 NaN 时按 +∞ 处理；优化器总是返回一个结果，
//! 是否收敛记录在 `Minimum::converged` 中，由调用方判断拟合质量。
//!
//! ## 依赖关系
//! - 被 `peaks/decompose.rs`、`index/integers.rs`、`cell/angle.rs`、
//!   `broadening.rs` 使用
//! - 无外部模块依赖

use log::trace;

/// 黄金分割比
const GOLDEN: f64 = 1.618_033_988_749_895;
const INV_GOLDEN: f64 = 0.618_033_988_749_895;

/// 优化结果
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub evaluations: usize,
    pub converged: bool,
}

/// 可替换的最小化策略
pub trait Minimizer {
    fn minimize(&self, objective: &dyn Fn(&[f64]) -> f64, initial: &[f64]) -> Minimum;
}

/// 计数并把 NaN 视为 +∞ 的目标函数包装
struct Counted<'a> {
    f: &'a dyn Fn(&[f64]) -> f64,
    calls: std::cell::Cell<usize>,
}

impl<'a> Counted<'a> {
    fn new(f: &'a dyn Fn(&[f64]) -> f64) -> Self {
        Self {
            f,
            calls: std::cell::Cell::new(0),
        }
    }

    fn eval(&self, x: &[f64]) -> f64 {
        self.calls.set(self.calls.get() + 1);
        let v = (self.f)(x);
        if v.is_nan() {
            f64::INFINITY
        } else {
            v
        }
    }
}

// ─────────────────────────────────────────────────────────────
// Nelder–Mead
// ─────────────────────────────────────────────────────────────

/// Nelder–Mead 下山单纯形法
#[derive(Debug, Clone)]
pub struct NelderMead {
    /// 每轮最大迭代次数，0 表示 `200 · n`
    pub max_iterations: usize,
    /// 顶点坐标的相对收敛容差
    pub xtol: f64,
    /// 函数值的相对收敛容差
    pub ftol: f64,
    /// 收敛后从最优点重建单纯形的次数
    pub restarts: usize,
    /// 初始单纯形的相对步长（坐标为 0 时使用 `zero_step`）
    pub initial_step: f64,
    pub zero_step: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iterations: 0,
            xtol: 1e-8,
            ftol: 1e-10,
            restarts: 3,
            initial_step: 0.05,
            zero_step: 0.00025,
        }
    }
}

impl NelderMead {
    fn run(&self, f: &Counted<'_>, start: &[f64], f_start: f64) -> (Vec<f64>, f64, bool) {
        let n = start.len();
        let max_iter = if self.max_iterations == 0 {
            200 * n
        } else {
            self.max_iterations
        };

        let mut sim: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
        sim.push(start.to_vec());
        for i in 0..n {
            let mut p = start.to_vec();
            p[i] = if p[i] != 0.0 {
                p[i] * (1.0 + self.initial_step)
            } else {
                self.zero_step
            };
            sim.push(p);
        }
        let mut fsim: Vec<f64> = Vec::with_capacity(n + 1);
        fsim.push(f_start);
        for p in sim.iter().skip(1) {
            fsim.push(f.eval(p));
        }

        let mut converged = false;
        for _ in 0..max_iter {
            let mut order: Vec<usize> = (0..=n).collect();
            order.sort_by(|&a, &b| fsim[a].total_cmp(&fsim[b]));
            sim = order.iter().map(|&i| sim[i].clone()).collect();
            fsim = order.iter().map(|&i| fsim[i]).collect();

            if self.is_converged(&sim, &fsim) {
                converged = true;
                break;
            }

            let mut centroid = vec![0.0; n];
            for p in &sim[..n] {
                for (c, v) in centroid.iter_mut().zip(p) {
                    *c += v / n as f64;
                }
            }
            let worst = sim[n].clone();
            let along = |t: f64| -> Vec<f64> {
                centroid
                    .iter()
                    .zip(&worst)
                    .map(|(c, w)| c + t * (c - w))
                    .collect()
            };

            let xr = along(1.0);
            let fr = f.eval(&xr);
            if fr < fsim[0] {
                let xe = along(2.0);
                let fe = f.eval(&xe);
                if fe < fr {
                    sim[n] = xe;
                    fsim[n] = fe;
                } else {
                    sim[n] = xr;
                    fsim[n] = fr;
                }
                continue;
            }
            if fr < fsim[n - 1] {
                sim[n] = xr;
                fsim[n] = fr;
                continue;
            }

            let (xc, fc, accept) = if fr < fsim[n] {
                let xc = along(0.5);
                let fc = f.eval(&xc);
                let ok = fc <= fr;
                (xc, fc, ok)
            } else {
                let xc = along(-0.5);
                let fc = f.eval(&xc);
                let ok = fc < fsim[n];
                (xc, fc, ok)
            };
            if accept {
                sim[n] = xc;
                fsim[n] = fc;
                continue;
            }

            // 收缩到最优顶点
            for i in 1..=n {
                let shrunk: Vec<f64> = sim[0]
                    .iter()
                    .zip(&sim[i])
                    .map(|(b, p)| b + 0.5 * (p - b))
                    .collect();
                fsim[i] = f.eval(&shrunk);
                sim[i] = shrunk;
            }
        }

        let best = (0..=n)
            .min_by(|&a, &b| fsim[a].total_cmp(&fsim[b]))
            .unwrap_or(0);
        (sim[best].clone(), fsim[best], converged)
    }

    fn is_converged(&self, sim: &[Vec<f64>], fsim: &[f64]) -> bool {
        let f0 = fsim[0];
        if !f0.is_finite() {
            return false;
        }
        let f_spread = fsim[1..]
            .iter()
            .map(|v| (v - f0).abs())
            .fold(0.0, f64::max);
        if f_spread > self.ftol * f0.abs() + f64::MIN_POSITIVE {
            return false;
        }
        sim[1..].iter().all(|p| {
            p.iter()
                .zip(&sim[0])
                .all(|(v, b)| (v - b).abs() <= self.xtol * b.abs() + 1e-300)
        })
    }
}

impl Minimizer for NelderMead {
    fn minimize(&self, objective: &dyn Fn(&[f64]) -> f64, initial: &[f64]) -> Minimum {
        let f = Counted::new(objective);
        let mut best = initial.to_vec();
        let mut best_value = f.eval(&best);
        if initial.is_empty() {
            return Minimum {
                x: best,
                value: best_value,
                evaluations: f.calls.get(),
                converged: true,
            };
        }

        let mut converged = false;
        for round in 0..=self.restarts {
            let (x, value, ok) = self.run(&f, &best, best_value);
            let gain = best_value - value;
            trace!("nelder-mead round {}: {:.6e} (gain {:.3e})", round, value, gain);
            if value <= best_value {
                best = x;
                best_value = value;
            }
            converged = ok;
            // 重建单纯形不再带来改进时结束
            if round > 0 && !(gain > self.ftol * best_value.abs()) {
                break;
            }
        }

        Minimum {
            x: best,
            value: best_value,
            evaluations: f.calls.get(),
            converged,
        }
    }
}

// ─────────────────────────────────────────────────────────────
// Powell
// ─────────────────────────────────────────────────────────────

/// Powell 共轭方向法（黄金分割线搜索）
#[derive(Debug, Clone)]
pub struct Powell {
    pub max_iterations: usize,
    pub ftol: f64,
    /// 线搜索的相对容差
    pub line_tol: f64,
    /// 各坐标方向的初始步长（长度不足时补 1.0）
    pub steps: Vec<f64>,
}

impl Default for Powell {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1e-12,
            line_tol: 1e-10,
            steps: Vec::new(),
        }
    }
}

impl Powell {
    /// 指定各坐标方向的初始步长
    pub fn with_steps(steps: Vec<f64>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    /// 沿方向 `dir` 做一维最小化，返回 (t, f(x + t·dir))
    fn line_minimize(&self, f: &Counted<'_>, x: &[f64], fx: f64, dir: &[f64]) -> (f64, f64) {
        let phi = |t: f64| -> f64 {
            let p: Vec<f64> = x.iter().zip(dir).map(|(xi, di)| xi + t * di).collect();
            f.eval(&p)
        };

        // 向下坡方向扩张，直到夹住极小值
        let (mut a, mut b) = (0.0, 1.0);
        let mut fb = phi(1.0);
        if fb > fx {
            std::mem::swap(&mut a, &mut b);
            fb = fx;
        }
        let mut c = b + GOLDEN * (b - a);
        let mut fc = phi(c);
        let mut expansions = 0;
        while fc < fb && expansions < 60 {
            a = b;
            b = c;
            fb = fc;
            c = b + GOLDEN * (b - a);
            fc = phi(c);
            expansions += 1;
        }
        if fc < fb {
            return (c, fc);
        }

        // 黄金分割收缩 [a, c]，b 为内点
        let (mut lo, mut hi) = if a < c { (a, c) } else { (c, a) };
        let mut x1 = hi - INV_GOLDEN * (hi - lo);
        let mut x2 = lo + INV_GOLDEN * (hi - lo);
        let mut f1 = phi(x1);
        let mut f2 = phi(x2);
        let mut iterations = 0;
        while (hi - lo).abs() > self.line_tol * (x1.abs() + x2.abs()) + 1e-20 && iterations < 200 {
            if f1 < f2 {
                hi = x2;
                x2 = x1;
                f2 = f1;
                x1 = hi - INV_GOLDEN * (hi - lo);
                f1 = phi(x1);
            } else {
                lo = x1;
                x1 = x2;
                f1 = f2;
                x2 = lo + INV_GOLDEN * (hi - lo);
                f2 = phi(x2);
            }
            iterations += 1;
        }

        // 返回三者中最好的点，保证不劣于起点
        let mut best = (b, fb);
        for cand in [(x1, f1), (x2, f2)] {
            if cand.1 < best.1 {
                best = cand;
            }
        }
        if fx <= best.1 {
            (0.0, fx)
        } else {
            best
        }
    }
}

impl Minimizer for Powell {
    fn minimize(&self, objective: &dyn Fn(&[f64]) -> f64, initial: &[f64]) -> Minimum {
        let f = Counted::new(objective);
        let n = initial.len();
        let mut x = initial.to_vec();
        let mut fx = f.eval(&x);
        if n == 0 {
            return Minimum {
                x,
                value: fx,
                evaluations: f.calls.get(),
                converged: true,
            };
        }

        let mut dirs: Vec<Vec<f64>> = (0..n)
            .map(|i| {
                let mut d = vec![0.0; n];
                d[i] = self.steps.get(i).copied().unwrap_or(1.0);
                d
            })
            .collect();

        let mut converged = false;
        for _ in 0..self.max_iterations {
            let x_start = x.clone();
            let f_start = fx;
            let mut biggest_drop = 0.0;
            let mut biggest_idx = 0;

            for (i, d) in dirs.iter().enumerate() {
                let (t, f_new) = self.line_minimize(&f, &x, fx, d);
                if fx - f_new > biggest_drop {
                    biggest_drop = fx - f_new;
                    biggest_idx = i;
                }
                for (xi, di) in x.iter_mut().zip(d) {
                    *xi += t * di;
                }
                fx = f_new;
            }

            if 2.0 * (f_start - fx) <= self.ftol * (f_start.abs() + fx.abs()) + 1e-30 {
                converged = true;
                break;
            }

            // 外推方向替换下降最多的方向
            let new_dir: Vec<f64> = x.iter().zip(&x_start).map(|(a, b)| a - b).collect();
            let extrapolated: Vec<f64> = x.iter().zip(&new_dir).map(|(a, d)| a + d).collect();
            let fe = f.eval(&extrapolated);
            if fe < f_start {
                let t = 2.0 * (f_start - 2.0 * fx + fe) * (f_start - fx - biggest_drop).powi(2)
                    - biggest_drop * (f_start - fe).powi(2);
                if t < 0.0 {
                    let (s, f_new) = self.line_minimize(&f, &x, fx, &new_dir);
                    for (xi, di) in x.iter_mut().zip(&new_dir) {
                        *xi += s * di;
                    }
                    fx = f_new;
                    dirs[biggest_idx] = dirs[n - 1].clone();
                    dirs[n - 1] = new_dir;
                }
            }
        }

        Minimum {
            x,
            value: fx,
            evaluations: f.calls.get(),
            converged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rosenbrock(x: &[f64]) -> f64 {
        (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2)
    }

    fn quadratic(x: &[f64]) -> f64 {
        (x[0] - 3.0).powi(2) + 10.0 * (x[1] + 1.0).powi(2) + 0.5 * (x[2] - 0.25).powi(2)
    }

    #[test]
    fn test_nelder_mead_rosenbrock() {
        let m = NelderMead::default().minimize(&rosenbrock, &[-1.2, 1.0]);
        assert!((m.x[0] - 1.0).abs() < 1e-4, "{:?}", m);
        assert!((m.x[1] - 1.0).abs() < 1e-4, "{:?}", m);
        assert!(m.value < 1e-8);
    }

    #[test]
    fn test_nelder_mead_quadratic() {
        let m = NelderMead::default().minimize(&quadratic, &[0.0, 0.0, 0.0]);
        assert!((m.x[0] - 3.0).abs() < 1e-5);
        assert!((m.x[1] + 1.0).abs() < 1e-5);
        assert!((m.x[2] - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_nelder_mead_rejects_infinite_region() {
        // x ≤ 0 的区域返回 +∞
        let f = |x: &[f64]| {
            if x[0] <= 0.0 {
                f64::INFINITY
            } else {
                (x[0] - 0.5).powi(2)
            }
        };
        let m = NelderMead::default().minimize(&f, &[2.0]);
        assert!((m.x[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_powell_quadratic() {
        let m = Powell::default().minimize(&quadratic, &[0.0, 0.0, 0.0]);
        assert!(m.converged);
        assert!((m.x[0] - 3.0).abs() < 1e-5, "{:?}", m);
        assert!((m.x[1] + 1.0).abs() < 1e-5, "{:?}", m);
        assert!((m.x[2] - 0.25).abs() < 1e-5, "{:?}", m);
    }

    #[test]
    fn test_powell_small_steps() {
        let f = |x: &[f64]| (x[0] - 0.002).powi(2) + (x[1] + 0.01).powi(2);
        let m = Powell::with_steps(vec![1e-3, 1e-2]).minimize(&f, &[0.0, 0.0]);
        assert!((m.x[0] - 0.002).abs() < 1e-7);
        assert!((m.x[1] + 0.01).abs() < 1e-7);
    }

    #[test]
    fn test_empty_parameter_vector() {
        let f = |_: &[f64]| 4.0;
        let m = NelderMead::default().minimize(&f, &[]);
        assert_eq!(m.value, 4.0);
        assert!(m.x.is_empty());
    }
}
