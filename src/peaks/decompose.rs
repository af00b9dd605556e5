//! # 扇区分峰
//!
//! 在单个扇区上用若干钟形峰拟合数据：
//! - `find_bells`：逐个增加峰数，自动确定峰数
//! - `find_bells_pp`：在给定的候选峰位上拟合，部分峰位可固定
//!
//! 目标函数是惩罚均方残差 `mse · (1 + var(widths))`，
//! 宽度或高度非正时返回 +∞，交给无导数优化器处理。
//!
//! ## 依赖关系
//! - 被 `peaks/search.rs` 使用
//! - 使用 `peaks/shapes.rs`、`peaks/sectors.rs`、`numeric/optimize.rs`

use crate::error::{ensure_same_len, PxrdError, Result};
use crate::models::{Bell, PeakRecord, Satellite};
use crate::numeric::{linspace, trapezoid, variance, Minimizer};
use crate::peaks::sectors::Sector;
use crate::peaks::shapes::ShapeKind;
use crate::progress::Progress;

use log::debug;
use serde::{Deserialize, Serialize};

/// 自动分峰参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecomposeOptions {
    pub shape: ShapeKind,
    /// 最小峰宽（σ 尺度）；宽度参数不超过 `2·sigma_min²` 的峰被丢弃
    pub sigma_min: f64,
    /// 确定峰数后是否以逐峰宽度重新优化
    pub vary_widths: bool,
    /// 峰数上限；0 表示只受扇区长度限制（点数 / 4）
    pub max_bells: usize,
}

impl Default for DecomposeOptions {
    fn default() -> Self {
        Self {
            shape: ShapeKind::Gaussian,
            sigma_min: 1e-3,
            vary_widths: true,
            max_bells: 10,
        }
    }
}

// ─────────────────────────────────────────────────────────────
// 参数向量布局
// ─────────────────────────────────────────────────────────────

/// 自由参数向量与完整峰列表之间的双射
///
/// 向量布局：`[自由峰位..., 高度 × n, 宽度 × n（或共享宽度 × 1）]`。
/// 固定峰位不进入向量，解包时按原序号插回。
#[derive(Debug, Clone, PartialEq)]
pub struct ParamLayout {
    anchors: Vec<Option<f64>>,
    shared_width: bool,
}

impl ParamLayout {
    /// 全部峰位自由
    pub fn free(peaks: usize, shared_width: bool) -> Self {
        Self {
            anchors: vec![None; peaks],
            shared_width,
        }
    }

    /// 按掩码固定部分峰位，宽度逐峰独立
    pub fn with_fixed(positions: &[f64], fixed: &[bool]) -> Result<Self> {
        ensure_same_len("fixed mask", positions.len(), fixed.len())?;
        Ok(Self {
            anchors: positions
                .iter()
                .zip(fixed)
                .map(|(&x, &f)| if f { Some(x) } else { None })
                .collect(),
            shared_width: false,
        })
    }

    pub fn peak_count(&self) -> usize {
        self.anchors.len()
    }

    pub fn free_positions(&self) -> usize {
        self.anchors.iter().filter(|a| a.is_none()).count()
    }

    /// 参数向量长度
    pub fn len(&self) -> usize {
        let n = self.peak_count();
        let widths = if self.shared_width { n.min(1) } else { n };
        self.free_positions() + n + widths
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 峰列表 → 自由参数向量（共享宽度取第一个峰的宽度）
    pub fn pack(&self, bells: &[Bell]) -> Vec<f64> {
        let mut params = Vec::with_capacity(self.len());
        params.extend(
            self.anchors
                .iter()
                .zip(bells)
                .filter(|(a, _)| a.is_none())
                .map(|(_, b)| b.position),
        );
        params.extend(bells.iter().map(|b| b.height));
        if self.shared_width {
            params.extend(bells.first().map(|b| b.width));
        } else {
            params.extend(bells.iter().map(|b| b.width));
        }
        params
    }

    /// 自由参数向量 → 峰列表
    pub fn unpack(&self, params: &[f64]) -> Vec<Bell> {
        let n = self.peak_count();
        let nf = self.free_positions();
        let mut free = params[..nf].iter();
        self.anchors
            .iter()
            .enumerate()
            .map(|(i, anchor)| {
                let position = match anchor {
                    Some(x) => *x,
                    None => free.next().copied().unwrap_or(f64::NAN),
                };
                let width = if self.shared_width {
                    params[nf + n]
                } else {
                    params[nf + n + i]
                };
                Bell::new(position, params[nf + i], width)
            })
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────
// 分峰器
// ─────────────────────────────────────────────────────────────

/// 一次分峰的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decomposition {
    pub shape: ShapeKind,
    /// 按构造顺序排列，不保证 x0 升序
    pub bells: Vec<Bell>,
    /// 惩罚目标函数最终值的平方根
    pub stdev: f64,
}

impl Decomposition {
    fn empty(shape: ShapeKind) -> Self {
        Self {
            shape,
            bells: Vec::new(),
            stdev: 0.0,
        }
    }

    /// 每个峰附带本次拟合的 stdev
    pub fn records(&self) -> Vec<PeakRecord> {
        self.bells
            .iter()
            .map(|&b| PeakRecord::from_bell(b, self.stdev))
            .collect()
    }
}

/// 单个扇区的分峰器
pub struct PeakDecomposer<'a> {
    sector: Sector,
    satellites: &'a [Satellite],
    minimizer: &'a dyn Minimizer,
}

/// 由扇区面积与最大值得到的初值尺度（已扣除附加谱线的份额）
struct Seed {
    area: f64,
    height: f64,
}

impl<'a> PeakDecomposer<'a> {
    pub fn new(sector: Sector, satellites: &'a [Satellite], minimizer: &'a dyn Minimizer) -> Self {
        Self {
            sector,
            satellites,
            minimizer,
        }
    }

    pub fn sector(&self) -> &Sector {
        &self.sector
    }

    /// 拟合曲线在扇区 x 上的值
    pub fn model(&self, shape: ShapeKind, bells: &[Bell]) -> Vec<f64> {
        evaluate(shape, self.satellites, self.sector.x(), bells)
    }

    fn seed(&self) -> Result<Seed> {
        let y = self.sector.y();
        let share = 1.0 + self.satellites.iter().map(|s| s.intensity).sum::<f64>();
        let area = trapezoid(y, self.sector.x()) / share;
        let height = y.iter().copied().fold(f64::NEG_INFINITY, f64::max) / share;
        if !(area > 0.0 && height > 0.0) {
            return Err(PxrdError::Unsolvable(format!(
                "sector [{:.6}, {:.6}] carries no positive signal",
                self.sector.range().0,
                self.sector.range().1
            )));
        }
        Ok(Seed { area, height })
    }

    /// 惩罚均方残差；`max_height` 只在共享宽度阶段使用
    fn deviation(&self, shape: ShapeKind, bells: &[Bell], max_height: Option<f64>) -> f64 {
        let out_of_domain = bells.iter().any(|b| {
            !(b.height > 0.0 && b.width > 0.0) || max_height.map_or(false, |m| b.height > m)
        });
        if out_of_domain {
            return f64::INFINITY;
        }
        let x = self.sector.x();
        let y = self.sector.y();
        let mut ss = 0.0;
        for (&xi, &yi) in x.iter().zip(y) {
            let fit: f64 = bells
                .iter()
                .map(|b| {
                    shape.eval_with_satellites(xi, b.position, b.height, b.width, self.satellites)
                })
                .sum();
            ss += (yi - fit) * (yi - fit);
        }
        let widths: Vec<f64> = bells.iter().map(|b| b.width).collect();
        let spread = if widths.is_empty() {
            0.0
        } else {
            variance(&widths)
        };
        ss / x.len() as f64 * (1.0 + spread)
    }

    /// 在给定布局下最小化，返回 (峰列表, 目标值)
    fn optimize(
        &self,
        shape: ShapeKind,
        layout: &ParamLayout,
        start: &[Bell],
        max_height: Option<f64>,
    ) -> (Vec<Bell>, f64) {
        let objective =
            |p: &[f64]| -> f64 { self.deviation(shape, &layout.unpack(p), max_height) };
        let min = self.minimizer.minimize(&objective, &layout.pack(start));
        if !min.converged {
            debug!(
                "optimizer stopped before convergence after {} evaluations",
                min.evaluations
            );
        }
        (layout.unpack(&min.x), min.value)
    }

    /// 自动确定峰数的分峰
    pub fn find_bells(
        &self,
        options: &DecomposeOptions,
        progress: &mut dyn Progress,
    ) -> Result<Decomposition> {
        let shape = options.shape;
        let seed = self.seed()?;
        let x = self.sector.x();
        let y = self.sector.y();
        let (x_first, x_last) = self.sector.range();

        let length_cap = (x.len() / 4).max(1);
        let max_peaks = if options.max_bells == 0 || options.max_bells > length_cap {
            length_cap
        } else {
            options.max_bells
        };

        let mut sigma2 = y.iter().map(|v| v * v).sum::<f64>() / y.len() as f64;
        let mut bells: Vec<Bell> = Vec::new();
        let mut done = 0usize;

        // 共享宽度下逐个增加峰数
        loop {
            let prev_bells = std::mem::take(&mut bells);
            let prev_sigma2 = sigma2;
            done += 1;

            let h = seed.height / done as f64;
            let w = shape.width_from_area(h, seed.area / done as f64);
            let positions = linspace(x_first, x_last, done + 2);
            let start: Vec<Bell> = positions[1..=done]
                .iter()
                .map(|&p| Bell::new(p, h, w))
                .collect();

            let layout = ParamLayout::free(done, true);
            let (fitted, value) = self.optimize(shape, &layout, &start, Some(seed.height));
            bells = fitted;
            sigma2 = value;
            debug!(
                "{} bell(s): previous {:.6e}, current {:.6e}",
                done, prev_sigma2, sigma2
            );

            if prev_sigma2 < sigma2 * (done + 1) as f64 / done as f64 {
                if done > 1 {
                    bells = prev_bells;
                    sigma2 = prev_sigma2;
                    done -= 1;
                }
                break;
            }
            if done == max_peaks {
                break;
            }
            progress.report(done as f64 / max_peaks as f64, &format!("{} bells", done));
            if progress.should_stop() {
                debug!("peak-count search stopped at {} bell(s)", done);
                break;
            }
        }

        let mut value = sigma2;
        if options.vary_widths {
            let layout = ParamLayout::free(done, false);
            let (fitted, v) = self.optimize(shape, &layout, &bells, None);
            bells = fitted;
            value = v;
        }

        let width_min = 2.0 * options.sigma_min * options.sigma_min;
        let kept: Vec<Bell> = bells
            .iter()
            .copied()
            .filter(|b| b.width > width_min)
            .collect();
        if kept.len() < bells.len() {
            debug!(
                "dropping {} bell(s) narrower than {:.3e}",
                bells.len() - kept.len(),
                width_min
            );
            bells = kept;
            if bells.is_empty() {
                value = self.deviation(shape, &bells, None);
            } else {
                let layout = ParamLayout::free(bells.len(), false);
                let (fitted, v) = self.optimize(shape, &layout, &bells, None);
                bells = fitted;
                value = v;
            }
        }

        Ok(Decomposition {
            shape,
            bells,
            stdev: value.sqrt(),
        })
    }

    /// 在候选峰位上分峰；`fixed[i]` 为真的峰位不参与精修
    pub fn find_bells_pp(
        &self,
        shape: ShapeKind,
        positions: &[f64],
        fixed: &[bool],
    ) -> Result<Decomposition> {
        ensure_same_len("fixed mask", positions.len(), fixed.len())?;
        if positions.is_empty() {
            return Ok(Decomposition::empty(shape));
        }
        if positions.iter().any(|p| !p.is_finite()) {
            return Err(PxrdError::InvalidInput(
                "candidate positions must be finite".to_string(),
            ));
        }
        let mut sorted = positions.to_vec();
        sorted.sort_by(f64::total_cmp);
        if let Some(w) = sorted.windows(2).find(|w| w[0] == w[1]) {
            return Err(PxrdError::InvalidInput(format!(
                "duplicate candidate position {}",
                w[0]
            )));
        }
        let seed = self.seed()?;
        let n = positions.len();
        let h = seed.height / n as f64;
        let w = shape.width_from_area(h, seed.area / n as f64);
        let start: Vec<Bell> = positions.iter().map(|&p| Bell::new(p, h, w)).collect();

        // 第一遍：峰位全部固定，只拟合高度与宽度
        let all_fixed = ParamLayout::with_fixed(positions, &vec![true; n])?;
        let (mut bells, mut value) = self.optimize(shape, &all_fixed, &start, None);

        // 第二遍：释放未固定的峰位
        let layout = ParamLayout::with_fixed(positions, fixed)?;
        if layout.free_positions() > 0 {
            let (fitted, v) = self.optimize(shape, &layout, &bells, None);
            bells = fitted;
            value = v;
        }

        Ok(Decomposition {
            shape,
            bells,
            stdev: value.sqrt(),
        })
    }
}

/// 在 `x` 上叠加全部峰（含附加谱线）
pub fn evaluate(shape: ShapeKind, satellites: &[Satellite], x: &[f64], bells: &[Bell]) -> Vec<f64> {
    x.iter()
        .map(|&xi| {
            bells
                .iter()
                .map(|b| shape.eval_with_satellites(xi, b.position, b.height, b.width, satellites))
                .sum()
        })
        .collect()
}
