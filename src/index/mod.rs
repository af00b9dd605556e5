//! # 指标化辅助模块
//!
//! 在峰位的 sin²θ 比值中寻找整数关系，为手工指标化提供候选。
//!
//! ## 依赖关系
//! - 被 CLI `integers` 命令使用
//! - 子模块: integers

pub mod integers;

pub use integers::{
    correct_angle, find_integers, like_integer, theta_correction, AngleCorrection, IntegerGroup,
    IntegerSearch, IntegerSearchOptions,
};
