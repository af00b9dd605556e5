//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `peaks`: 背景扣除 + 分峰
//! - `cell`: 由 (d, hkl) 表精修晶胞
//! - `integers`: 在峰位的 sin²θ 比值中寻找整数关系
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: peaks, cell, integers

pub mod cell;
pub mod integers;
pub mod peaks;

use clap::{Parser, Subcommand, ValueEnum};
use pxrd::XUnits;

/// pxrd - 粉末 X 射线衍射分析
#[derive(Parser)]
#[command(name = "pxrd")]
#[command(version)]
#[command(about = "Powder X-ray diffraction analysis: peaks, cell refinement, index search", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Strip the background and decompose a pattern into peaks
    Peaks(peaks::PeaksArgs),

    /// Refine cell constants from indexed reflections
    Cell(cell::CellArgs),

    /// Search integer relations between sin²θ of peak positions
    Integers(integers::IntegersArgs),
}

// ─────────────────────────────────────────────────────────────
// 公共参数
// ─────────────────────────────────────────────────────────────

/// 输入横坐标单位
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum UnitsArg {
    /// Diffraction angle 2θ in degrees
    #[default]
    TwoTheta,
    /// Bragg angle θ in degrees
    Theta,
    /// sin θ
    SinTheta,
    /// Scattering vector q in Å⁻¹
    Q,
}

impl From<UnitsArg> for XUnits {
    fn from(u: UnitsArg) -> Self {
        match u {
            UnitsArg::TwoTheta => XUnits::TwoTheta,
            UnitsArg::Theta => XUnits::Theta,
            UnitsArg::SinTheta => XUnits::SinTheta,
            UnitsArg::Q => XUnits::Q,
        }
    }
}

/// 预定义辐射源波长 (Å)
pub fn get_predefined_wavelength(name: &str) -> Option<f64> {
    match name.to_lowercase().as_str() {
        "cu-ka" | "cuka" => Some(1.5418),
        "cu-ka1" | "cuka1" => Some(1.5406),
        "cu-ka2" | "cuka2" => Some(1.5444),
        "cu-kb1" | "cukb1" => Some(1.3922),
        "mo-ka" | "moka" => Some(0.7107),
        "mo-ka1" | "moka1" => Some(0.7093),
        "mo-ka2" | "moka2" => Some(0.7136),
        "co-ka" | "coka" => Some(1.7903),
        "fe-ka" | "feka" => Some(1.9373),
        "cr-ka" | "crka" => Some(2.2910),
        "ag-ka" | "agka" => Some(0.5609),
        _ => None,
    }
}

/// 解析波长输入（辐射源名称或数值）
pub fn parse_wavelength(input: &str) -> Result<f64, String> {
    // 先尝试解析为预定义辐射源
    if let Some(wl) = get_predefined_wavelength(input) {
        return Ok(wl);
    }
    match input.parse::<f64>() {
        Ok(v) if v > 0.0 && v.is_finite() => Ok(v),
        _ => Err(format!(
            "Invalid wavelength '{}'. Use a positive number in Å or a name: cu-ka1, cu-ka2, mo-ka, co-ka, fe-ka, cr-ka, ag-ka",
            input
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wavelength() {
        assert_eq!(parse_wavelength("cu-ka1"), Ok(1.5406));
        assert_eq!(parse_wavelength("CuKa2"), Ok(1.5444));
        assert_eq!(parse_wavelength("0.424589"), Ok(0.424589));
        assert!(parse_wavelength("-1").is_err());
        assert!(parse_wavelength("unobtainium").is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "pxrd", "-v", "cell", "refl.csv", "--system", "hex",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Cell(_)));

        let cli = Cli::try_parse_from([
            "pxrd", "peaks", "scan.csv", "--units", "sin-theta", "--shape", "lorentzian",
        ])
        .unwrap();
        match cli.command {
            Commands::Peaks(args) => {
                assert_eq!(args.units, UnitsArg::SinTheta);
                assert_eq!(args.wavelength, 1.5406);
            }
            _ => panic!("expected peaks"),
        }
    }
}
