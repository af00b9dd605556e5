//! # 峰处理模块
//!
//! 从原始图样到峰列表的流水线：
//!
//! ```text
//! background (迭代剔除的多项式背景)
//!   └── sectors (扣除背景后高于噪声的连续区段)
//!         └── decompose (逐扇区分解为钟形峰)
//!               └── search (整张图样汇总)
//! ```
//!
//! ## 依赖关系
//! - 被 CLI `peaks` 命令使用
//! - 子模块: background, sectors, shapes, decompose, search
//! - 使用 `numeric/` 的多项式拟合与优化器

pub mod background;
pub mod decompose;
pub mod search;
pub mod sectors;
pub mod shapes;

pub use background::{estimate_background, BackgroundModel, BackgroundOptions};
pub use decompose::{evaluate, DecomposeOptions, Decomposition, PeakDecomposer};
pub use search::{find_peaks, Candidate, PeakSearchConfig, PeakSearchReport, SectorOutcome};
pub use sectors::{sectors, Sector, SectorOptions};
pub use shapes::ShapeKind;
