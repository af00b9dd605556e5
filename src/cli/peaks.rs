//! # peaks 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/peaks.rs`

use super::{parse_wavelength, UnitsArg};

use clap::{Args, ValueEnum};
use pxrd::ShapeKind;
use std::path::PathBuf;

/// 峰形
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum ShapeArg {
    /// h·exp(−dx²/w)
    #[default]
    Gaussian,
    /// h/(1 + dx²/w)
    Lorentzian,
    /// h/(1 + dx²/w)²
    PseudoVoigt,
}

impl From<ShapeArg> for ShapeKind {
    fn from(s: ShapeArg) -> Self {
        match s {
            ShapeArg::Gaussian => ShapeKind::Gaussian,
            ShapeArg::Lorentzian => ShapeKind::Lorentzian,
            ShapeArg::PseudoVoigt => ShapeKind::PseudoVoigt,
        }
    }
}

/// peaks 子命令参数
#[derive(Args, Debug)]
pub struct PeaksArgs {
    /// CSV file with `x,y` columns
    pub input: PathBuf,

    /// Units of the x column
    #[arg(short, long, value_enum, default_value = "two-theta")]
    pub units: UnitsArg,

    /// Primary wavelength: radiation source name (cu-ka1, mo-ka, ...) or value in Å
    #[arg(short, long, default_value = "cu-ka1", value_parser = parse_wavelength)]
    pub wavelength: f64,

    /// Second emission line (e.g. cu-ka2) fitted together with every peak
    #[arg(long, value_parser = parse_wavelength)]
    pub lambda2: Option<f64>,

    /// Relative intensity of the second line
    #[arg(long, default_value_t = 0.5)]
    pub i2: f64,

    /// Peak shape
    #[arg(short, long, value_enum, default_value = "gaussian")]
    pub shape: ShapeArg,

    /// Background polynomial degree (overrides config)
    #[arg(long)]
    pub degree: Option<usize>,

    /// Noise threshold multiplier for background and sectors (overrides config)
    #[arg(long)]
    pub sigma: Option<f64>,

    /// Maximum number of peaks tried per sector (overrides config)
    #[arg(long)]
    pub max_bells: Option<usize>,

    /// Fit only at these positions (same units as the input), comma separated
    #[arg(long, value_delimiter = ',')]
    pub at: Vec<f64>,

    /// Keep the `--at` positions fixed
    #[arg(long, default_value_t = false, requires = "at")]
    pub fixed: bool,

    /// JSON analysis config
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write the peak list to this CSV file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Run size/strain analysis on the fitted peaks
    #[arg(long, default_value_t = false)]
    pub broadening: bool,

    /// Instrumental broadening in 2θ radians (estimated when omitted)
    #[arg(long, requires = "broadening")]
    pub instrumental: Option<f64>,
}
