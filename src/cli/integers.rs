//! # integers 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/integers.rs`

use super::{parse_wavelength, UnitsArg};

use clap::Args;
use std::path::PathBuf;

/// integers 子命令参数
#[derive(Args, Debug)]
pub struct IntegersArgs {
    /// CSV file with an `x` (or `x0`) column of peak positions
    pub input: PathBuf,

    /// Units of the positions
    #[arg(short, long, value_enum, default_value = "sin-theta")]
    pub units: UnitsArg,

    /// Wavelength (needed for q units)
    #[arg(short, long, default_value = "cu-ka1", value_parser = parse_wavelength)]
    pub wavelength: f64,

    /// Near-integer tolerance (overrides config)
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Largest multiplier tried for each reference peak (overrides config)
    #[arg(long)]
    pub max_multiplier: Option<u32>,

    /// JSON analysis config
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of groups shown
    #[arg(short = 'n', long, default_value_t = 10)]
    pub top: usize,

    /// Refine the zero shift of the best group
    #[arg(long, default_value_t = false)]
    pub correct: bool,

    /// Write all groups to this CSV file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
