//! # 衍射峰数据模型
//!
//! `PeakRecord` 是拟合得到的单个峰 `(x0, height, width, stdev)`；
//! `PeakList` 是整张图样的峰列表（按 x0 升序）及其共享的峰形类型。
//!
//! ## 依赖关系
//! - 被 `peaks/`、`index/`、`broadening.rs`、CLI 命令使用
//! - 使用 `peaks/shapes.rs` 的 ShapeKind

use crate::error::{PxrdError, Result};
use crate::peaks::shapes::ShapeKind;

use serde::{Deserialize, Serialize};

/// 优化过程中使用的峰参数三元组
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bell {
    pub position: f64,
    pub height: f64,
    /// 峰形相关的平方尺度参数
    pub width: f64,
}

impl Bell {
    pub fn new(position: f64, height: f64, width: f64) -> Self {
        Self {
            position,
            height,
            width,
        }
    }
}

/// 拟合得到的衍射峰
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakRecord {
    /// 峰位
    pub x0: f64,
    /// 峰高
    pub height: f64,
    /// 峰形相关的平方尺度参数（不是 FWHM）
    pub width: f64,
    /// 所在拟合的均方根偏差，同一次拟合的峰取值相同
    pub stdev: f64,
}

impl PeakRecord {
    pub fn from_bell(bell: Bell, stdev: f64) -> Self {
        Self {
            x0: bell.position,
            height: bell.height,
            width: bell.width,
            stdev,
        }
    }

    pub fn bell(&self) -> Bell {
        Bell::new(self.x0, self.height, self.width)
    }
}

/// 整张图样的峰列表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakList {
    pub shape: ShapeKind,
    pub peaks: Vec<PeakRecord>,
}

impl PeakList {
    pub fn new(shape: ShapeKind, mut peaks: Vec<PeakRecord>) -> Self {
        peaks.sort_by(|a, b| a.x0.total_cmp(&b.x0));
        Self { shape, peaks }
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    /// 峰位序列
    pub fn positions(&self) -> Vec<f64> {
        self.peaks.iter().map(|p| p.x0).collect()
    }

    /// 展平为长度 4·n 的数组 `[x0, h, w, s, x0, h, w, s, ...]`
    pub fn to_flat(&self) -> Vec<f64> {
        self.peaks
            .iter()
            .flat_map(|p| [p.x0, p.height, p.width, p.stdev])
            .collect()
    }

    /// 从长度 4·n 的数组恢复
    pub fn from_flat(shape: ShapeKind, flat: &[f64]) -> Result<Self> {
        if flat.len() % 4 != 0 {
            return Err(PxrdError::InvalidInput(format!(
                "flat peak array length {} is not a multiple of 4",
                flat.len()
            )));
        }
        let peaks = flat
            .chunks_exact(4)
            .map(|c| PeakRecord {
                x0: c[0],
                height: c[1],
                width: c[2],
                stdev: c[3],
            })
            .collect();
        Ok(Self::new(shape, peaks))
    }

    /// 各峰的半高全宽
    pub fn fwhm(&self) -> Vec<f64> {
        self.peaks.iter().map(|p| self.shape.fwhm(p.width)).collect()
    }

    /// 各峰的积分面积
    pub fn areas(&self) -> Vec<f64> {
        self.peaks
            .iter()
            .map(|p| self.shape.area(p.height, p.width))
            .collect()
    }
}
