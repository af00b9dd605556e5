//! # cell 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/cell.rs`

use super::parse_wavelength;

use clap::Args;
use pxrd::cell::Centering;
use pxrd::CrystalSystem;
use std::path::PathBuf;

fn parse_system(input: &str) -> Result<CrystalSystem, String> {
    input.parse().map_err(|e: pxrd::PxrdError| e.to_string())
}

fn parse_centering(input: &str) -> Result<Centering, String> {
    input.parse().map_err(|e: pxrd::PxrdError| e.to_string())
}

/// cell 子命令参数
#[derive(Args, Debug)]
pub struct CellArgs {
    /// CSV file with `d,h,k,l` columns
    pub input: PathBuf,

    /// Crystal system (cubic, tetragonal, hexagonal, orthorhombic, rhombohedral, monoclinic)
    #[arg(short, long, value_parser = parse_system)]
    pub system: CrystalSystem,

    /// Also fit a cubic correction polynomial to the diffraction angles
    #[arg(long, default_value_t = false)]
    pub fix_angle: bool,

    /// Wavelength used for the angle correction
    #[arg(short, long, default_value = "cu-ka1", value_parser = parse_wavelength)]
    pub wavelength: f64,

    /// List this many predicted reflections of the refined cell
    #[arg(long, default_value_t = 0)]
    pub predict: usize,

    /// Lattice centering for predicted reflections (P, I, A, B, C, F)
    #[arg(long, default_value = "P", value_parser = parse_centering)]
    pub centering: Centering,

    /// Largest |h|, |k|, |l| for predicted reflections
    #[arg(long, default_value_t = 4)]
    pub max_index: i32,
}
