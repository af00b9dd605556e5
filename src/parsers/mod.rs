//! # 输入解析模块
//!
//! 读取 CLI 使用的纯文本 CSV 表格（带表头，`#` 开头为注释行）。
//!
//! ## 依赖关系
//! - 被 `commands/` 模块使用
//! - 使用 `pxrd::models` 数据模型
//! - 子模块: tables

pub mod tables;

pub use tables::{read_pattern, read_positions, read_reflections};
