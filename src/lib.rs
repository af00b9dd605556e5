//! # pxrd - 粉末 X 射线衍射数值核心
//!
//! 从一维衍射图样出发：扣除背景、分割峰区、分解为钟形峰，
//! 再由指标化的峰位精修晶胞参数，或在 sin²θ 比值中寻找整数关系。
//!
//! ## 依赖关系
//! ```text
//! lib.rs
//!   ├── models/     (图样、峰、晶胞数据模型)
//!   ├── numeric/    (最小二乘、优化器、统计)
//!   ├── peaks/      (背景、扇区、分峰、峰搜索)
//!   ├── cell/       (晶胞精修、正向模型、角度校正)
//!   ├── index/      (整数关系搜索)
//!   ├── broadening.rs (尺寸 / 应变分析)
//!   ├── config.rs   (分析参数)
//!   ├── progress.rs (进度与取消)
//!   └── error.rs    (错误处理)
//! ```
//!
//! 所有操作都是单线程、同步的；取消通过 `Progress::should_stop` 协作完成。

pub mod broadening;
pub mod cell;
pub mod config;
pub mod error;
pub mod index;
pub mod models;
pub mod numeric;
pub mod peaks;
pub mod progress;

pub use config::AnalysisConfig;
pub use error::{PxrdError, Result};
pub use models::{CellModel, CrystalSystem, Miller, Pattern, PeakList, PeakRecord, XUnits};
pub use peaks::ShapeKind;
pub use progress::{CancelToken, Progress, Silent, Status};
