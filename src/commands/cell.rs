//! # cell 子命令实现
//!
//! ## 功能
//! - 由 `d,h,k,l` 表精修指定晶系的晶胞参数
//! - 可选：三次多项式校正衍射角后重新精修
//! - 可选：列出精修晶胞的前若干条衍射
//!
//! ## 依赖关系
//! - 使用 `cli/cell.rs` 定义的参数
//! - 使用 `pxrd::cell`
//! - 使用 `utils/output.rs`, `utils/progress.rs`

use crate::cli::cell::CellArgs;
use crate::parsers;
use crate::utils::{output, progress};

use anyhow::{bail, Result};
use pxrd::cell::{fix_angle, generate_reflections, refine_cell};
use pxrd::models::{IndexAssignment, Reflection, CELL_TUPLE_LABELS};
use pxrd::numeric::NelderMead;
use pxrd::CellModel;
use tabled::{Table, Tabled};

#[derive(Debug, Clone, Tabled)]
struct ParamRow {
    #[tabled(rename = "Parameter")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Debug, Clone, Tabled)]
struct ReflectionRow {
    #[tabled(rename = "(hkl)")]
    hkl: String,
    #[tabled(rename = "d (Å)")]
    d: String,
    #[tabled(rename = "2θ (°)")]
    two_theta: String,
}

/// 执行晶胞精修
pub fn execute(args: CellArgs) -> Result<()> {
    output::print_header(&format!("Refining {} Cell", args.system));

    let mut reflections = parsers::read_reflections(&args.input)?;
    if reflections.is_empty() {
        bail!("'{}' contains no reflections", args.input.display());
    }
    output::print_info(&format!("Read {} indexed reflections", reflections.len()));

    let cell = refine_cell(args.system, &reflections)?;
    print_cell(&cell);

    if args.fix_angle {
        // 峰序号按 d 降序
        reflections.sort_by(|a, b| b.d.total_cmp(&a.d));
        let sin_theta: Vec<f64> = reflections
            .iter()
            .map(|r| args.wavelength / (2.0 * r.d))
            .collect();
        let assignment: IndexAssignment = reflections
            .iter()
            .enumerate()
            .map(|(i, r)| (i, r.hkl))
            .collect();

        let spinner = progress::create_spinner("Fitting angle correction...");
        let fix = fix_angle(
            &sin_theta,
            args.wavelength,
            args.system,
            &assignment,
            &NelderMead::default(),
        );
        spinner.finish_and_clear();
        let fix = fix?;

        output::print_header("Angle Correction θ' = c₀ + c₁θ + c₂θ² + c₃θ³");
        for (i, c) in fix.coefficients.iter().enumerate() {
            output::print_value(&format!("c{}", i), &format!("{:.6e}", c));
        }
        output::print_value("χ² before", &format!("{:.6e}", fix.chi2_before));
        output::print_value("χ² after", &format!("{:.6e}", fix.chi2_after));
        print_cell(&fix.cell);
    }

    if args.predict > 0 {
        let predicted = generate_reflections(&cell, args.max_index, args.centering)?;
        print_reflections(&predicted, args.predict, args.wavelength);
    }

    Ok(())
}

fn print_cell(cell: &CellModel) {
    let rows: Vec<ParamRow> = CELL_TUPLE_LABELS
        .iter()
        .zip(cell.to_tuple())
        .filter_map(|(name, v)| {
            v.map(|v| ParamRow {
                name: name.to_string(),
                value: format!("{:.6e}", v),
            })
        })
        .collect();
    println!("{}", Table::new(&rows));
}

fn print_reflections(reflections: &[Reflection], count: usize, wavelength: f64) {
    let rows: Vec<ReflectionRow> = reflections
        .iter()
        .take(count)
        .map(|r| {
            let s = wavelength / (2.0 * r.d);
            ReflectionRow {
                hkl: r.hkl.to_string(),
                d: format!("{:.4}", r.d),
                two_theta: if s <= 1.0 {
                    format!("{:.3}", 2.0 * s.asin().to_degrees())
                } else {
                    "-".to_string()
                },
            }
        })
        .collect();
    output::print_header(&format!("First {} Predicted Reflections", rows.len()));
    println!("{}", Table::new(&rows));
}
