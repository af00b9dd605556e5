//! # 数据模型模块
//!
//! 定义衍射图样、衍射峰与晶胞的数据模型。
//!
//! ## 依赖关系
//! - 被 `peaks/`、`cell/`、`index/` 和 CLI 命令使用
//! - 子模块: pattern, peak, cell

pub mod cell;
pub mod pattern;
pub mod peak;

pub use cell::{
    CellModel, CellVariances, CrystalSystem, IndexAssignment, Miller, Reflection,
    CELL_TUPLE_LABELS,
};
pub use pattern::{d_spacing, to_sin_theta, Pattern, Satellite, SpectralLine, Wavelengths, XUnits};
pub use peak::{Bell, PeakList, PeakRecord};
