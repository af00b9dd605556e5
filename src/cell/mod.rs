//! # 晶胞模块
//!
//! 由已指标化的衍射精修晶胞参数、由晶胞计算衍射位置，
//! 以及基于晶胞残差的仪器角度校正。
//!
//! ## 依赖关系
//! - 被 CLI `cell` 命令使用
//! - 子模块: refine, forward, angle
//! - 使用 `numeric/` 求解法方程与优化

pub mod angle;
pub mod forward;
pub mod refine;

pub use angle::{fix_angle, AngleFix};
pub use forward::{generate_reflections, Centering};
pub use refine::{reflections_from_assignment, refine_cell};
