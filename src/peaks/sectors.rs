//! # 扇区分割
//!
//! 把扣除背景后的图样切成若干连续的"高于背景"区段，每段单独分峰。
//!
//! 单遍状态机：
//! - 状态 A：`prev` 缓冲累积可能的扇区起点。点 ≤ 0，或比缓冲中上一个点
//!   下降超过一半时，缓冲从该点重新开始。
//! - 状态 B：某点超过 `σ·k` 时，`prev` 缓冲成为扇区开头，之后的点依次加入；
//!   遇到 y < 0 的点时扇区结束并产出，该点成为新的 `prev` 缓冲。
//!
//! 产出的扇区首尾 y 恰为 0：负端点移到线性插值的过零点，
//! 正端点（数据边缘）直接置 0。
//!
//! ## 依赖关系
//! - 被 `peaks/search.rs`、`peaks/decompose.rs` 使用

use crate::error::{ensure_same_len, PxrdError, Result};

use log::debug;
use serde::{Deserialize, Serialize};

/// 扇区分割参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectorOptions {
    /// 进入扇区的阈值 σ 倍数（"置信因子"）
    pub sigma_multiplier: f64,
    /// 点数少于该值的扇区被丢弃
    pub min_points: usize,
}

impl Default for SectorOptions {
    fn default() -> Self {
        Self {
            sigma_multiplier: 2.0,
            min_points: 5,
        }
    }
}

/// 一段高于背景的连续数据，首尾 y 为 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl Sector {
    /// 由原始点构造，并修正首尾边界
    pub fn from_points(mut x: Vec<f64>, mut y: Vec<f64>) -> Result<Self> {
        ensure_same_len("sector y", x.len(), y.len())?;
        if x.len() < 2 {
            return Err(PxrdError::InvalidInput(format!(
                "a sector needs at least 2 points, got {}",
                x.len()
            )));
        }
        let n = x.len();
        fix_boundary(&mut x, &mut y, 0, 1);
        fix_boundary(&mut x, &mut y, n - 1, n - 2);
        Ok(Self { x, y })
    }

    fn from_pairs(points: Vec<(f64, f64)>) -> Result<Self> {
        let (x, y) = points.into_iter().unzip();
        Self::from_points(x, y)
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// 扇区的 x 范围（含端点）
    pub fn range(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }

    pub fn contains(&self, x: f64) -> bool {
        let (lo, hi) = self.range();
        lo <= x && x <= hi
    }
}

/// 将端点 `end` 置为 y = 0；负值时 x 插值到与相邻点 `inner` 连线的过零点
fn fix_boundary(x: &mut [f64], y: &mut [f64], end: usize, inner: usize) {
    let (x1, y1) = (x[end], y[end]);
    let (x2, y2) = (x[inner], y[inner]);
    if y1 < 0.0 && y2 != y1 {
        x[end] = x1 - y1 * (x2 - x1) / (y2 - y1);
    }
    y[end] = 0.0;
}

/// 扇区迭代器（单遍，不可重启）
#[derive(Debug)]
pub struct Sectors<'a> {
    x: &'a [f64],
    y: &'a [f64],
    threshold: f64,
    min_points: usize,
    cursor: usize,
    sector: Vec<(f64, f64)>,
    prev: Vec<(f64, f64)>,
}

/// 对扣除背景的数据进行扇区分割
pub fn sectors<'a>(
    x: &'a [f64],
    stripped_y: &'a [f64],
    sigma2: f64,
    options: &SectorOptions,
) -> Result<Sectors<'a>> {
    ensure_same_len("stripped y", x.len(), stripped_y.len())?;
    if !(sigma2.is_finite() && sigma2 >= 0.0) {
        return Err(PxrdError::InvalidInput(format!(
            "residual variance must be non-negative, got {}",
            sigma2
        )));
    }
    if !(options.sigma_multiplier.is_finite() && options.sigma_multiplier > 0.0) {
        return Err(PxrdError::InvalidInput(format!(
            "sigma multiplier must be positive, got {}",
            options.sigma_multiplier
        )));
    }
    Ok(Sectors {
        x,
        y: stripped_y,
        threshold: sigma2.sqrt() * options.sigma_multiplier,
        min_points: options.min_points.max(2),
        cursor: 0,
        sector: Vec::new(),
        prev: Vec::new(),
    })
}

impl<'a> Sectors<'a> {
    /// 推进状态机，返回下一个闭合的原始扇区
    fn next_raw(&mut self) -> Option<Vec<(f64, f64)>> {
        while self.cursor < self.x.len() {
            let point = (self.x[self.cursor], self.y[self.cursor]);
            self.cursor += 1;
            let y = point.1;

            if y > self.threshold {
                if !self.prev.is_empty() {
                    self.sector = std::mem::take(&mut self.prev);
                }
                self.sector.push(point);
            } else if !self.sector.is_empty() {
                self.sector.push(point);
                if y < 0.0 {
                    self.prev.push(point);
                    return Some(std::mem::take(&mut self.sector));
                }
            } else if y <= 0.0 || self.prev.last().map_or(false, |p| p.1 - y > y) {
                self.prev.clear();
                self.prev.push(point);
            } else {
                self.prev.push(point);
            }
        }
        if self.sector.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.sector))
        }
    }
}

impl<'a> Iterator for Sectors<'a> {
    type Item = Sector;

    fn next(&mut self) -> Option<Sector> {
        while let Some(points) = self.next_raw() {
            if points.len() < self.min_points {
                debug!(
                    "discarding sector of {} points at x = {:.6}",
                    points.len(),
                    points[0].0
                );
                continue;
            }
            match Sector::from_pairs(points) {
                Ok(sector) => {
                    debug!(
                        "sector [{:.6}, {:.6}] with {} points",
                        sector.range().0,
                        sector.range().1,
                        sector.len()
                    );
                    return Some(sector);
                }
                Err(e) => debug!("skipping malformed sector: {}", e),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_bumps() -> (Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (0..60).map(|i| i as f64 * 0.1).collect();
        let y = x
            .iter()
            .map(|&v| {
                10.0 * (-(v - 1.5f64).powi(2) / 0.05).exp()
                    + 8.0 * (-(v - 4.0f64).powi(2) / 0.05).exp()
                    - 0.2
            })
            .collect();
        (x, y)
    }

    #[test]
    fn test_sector_boundaries_are_zero() {
        let (x, y) = two_bumps();
        let found: Vec<Sector> = sectors(&x, &y, 0.04, &SectorOptions::default())
            .unwrap()
            .collect();
        assert_eq!(found.len(), 2);
        for s in &found {
            assert_eq!(s.y()[0], 0.0);
            assert_eq!(s.y()[s.len() - 1], 0.0);
            assert!(s.x().windows(2).all(|w| w[1] > w[0]));
        }
        assert!(found[0].contains(1.5));
        assert!(found[1].contains(4.0));
        assert!(!found[0].contains(4.0));
    }

    #[test]
    fn test_zero_crossing_interpolation() {
        let s = Sector::from_points(vec![1.0, 2.0, 3.0, 4.0], vec![-1.0, 1.0, 3.0, -3.0]).unwrap();
        assert_eq!(s.x()[0], 1.5);
        assert_eq!(s.x()[3], 3.5);
        assert_eq!(s.y(), &[0.0, 1.0, 3.0, 0.0]);
    }

    #[test]
    fn test_open_sector_at_data_edge() {
        // 数据在峰内结束：末端为正，直接置 0
        let x = vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let y = vec![-1.0, 0.5, 2.0, 5.0, 6.0, 7.0];
        let found: Vec<Sector> = sectors(&x, &y, 1.0, &SectorOptions::default())
            .unwrap()
            .collect();
        assert_eq!(found.len(), 1);
        let s = &found[0];
        assert_eq!(s.len(), 6);
        assert_eq!(s.y()[5], 0.0);
        assert_eq!(s.x()[5], 5.0);
        assert!((s.x()[0] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_short_sectors_are_discarded() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y = vec![-1.0, 5.0, -1.0, -1.0, -1.0, 1.0, 5.0, 6.0, 4.0, -1.0];
        let all: Vec<Sector> = sectors(
            &x,
            &y,
            1.0,
            &SectorOptions {
                min_points: 2,
                ..Default::default()
            },
        )
        .unwrap()
        .collect();
        assert_eq!(all.len(), 2);

        let filtered: Vec<Sector> = sectors(&x, &y, 1.0, &SectorOptions::default())
            .unwrap()
            .collect();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].len(), 6);
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(sectors(&[1.0, 2.0], &[1.0], 1.0, &SectorOptions::default()).is_err());
        assert!(sectors(&[1.0], &[1.0], -1.0, &SectorOptions::default()).is_err());
    }
}
