//! # integers 子命令实现
//!
//! 在峰位的 sin²θ 比值中寻找整数关系，按偏差排列输出。
//!
//! ## 依赖关系
//! - 使用 `cli/integers.rs` 定义的参数
//! - 使用 `pxrd::index`
//! - 使用 `utils/output.rs`, `utils/progress.rs`

use crate::cli::integers::IntegersArgs;
use crate::parsers;
use crate::utils::{output, progress};

use anyhow::{Context, Result};
use pxrd::index::{correct_angle, find_integers, IntegerGroup};
use pxrd::models::to_sin_theta;
use pxrd::{AnalysisConfig, XUnits};
use std::path::Path;
use tabled::{Table, Tabled};

#[derive(Debug, Clone, Tabled)]
struct GroupRow {
    #[tabled(rename = "Rank")]
    rank: usize,
    #[tabled(rename = "Ref")]
    reference: usize,
    #[tabled(rename = "×")]
    multiplier: u32,
    #[tabled(rename = "Deviation")]
    deviation: String,
    #[tabled(rename = "Δθ (°)")]
    delta_theta: String,
    #[tabled(rename = "Integers (peak:n)")]
    integers: String,
}

fn format_integers(group: &IntegerGroup) -> String {
    group
        .integers
        .iter()
        .map(|(k, v)| format!("{}:{}", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}

/// 执行整数搜索
pub fn execute(args: IntegersArgs) -> Result<()> {
    output::print_header("Integer Relations in sin²θ");

    let mut config = match &args.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(t) = args.tolerance {
        config.integers.tolerance = t;
    }
    if let Some(m) = args.max_multiplier {
        config.integers.max_multiplier = m;
    }

    let units: XUnits = args.units.into();
    let mut sin_theta = parsers::read_positions(&args.input)?
        .into_iter()
        .map(|v| to_sin_theta(v, units, args.wavelength))
        .collect::<pxrd::Result<Vec<_>>>()?;
    sin_theta.sort_by(f64::total_cmp);
    output::print_info(&format!("{} peak positions", sin_theta.len()));

    let mut pb = progress::BarProgress::new("searching");
    let search = find_integers(&sin_theta, &config.integers, &mut pb)?;
    pb.finish();

    if search.cancelled {
        output::print_warning("Search was cancelled; results are partial.");
    }
    if search.groups.is_empty() {
        output::print_warning("No integer groups found.");
        return Ok(());
    }
    output::print_success(&format!("{} distinct group(s)", search.groups.len()));

    let rows: Vec<GroupRow> = search
        .groups
        .iter()
        .take(args.top)
        .enumerate()
        .map(|(i, g)| GroupRow {
            rank: i + 1,
            reference: g.reference,
            multiplier: g.multiplier,
            deviation: format!("{:.3e}", g.deviation),
            delta_theta: format!("{:.4}", g.correction.0.to_degrees()),
            integers: format_integers(g),
        })
        .collect();
    output::print_header(&format!("Top {} Groups", rows.len()));
    println!("{}", Table::new(&rows));

    if args.correct {
        let best = &search.groups[0];
        let selected: Vec<usize> = best.integers.keys().copied().collect();
        let fix = correct_angle(
            &sin_theta,
            best.reference,
            best.multiplier as f64,
            &selected,
        )?;
        output::print_header("Zero Shift of the Best Group");
        output::print_value("Δθ (°)", &format!("{:.5}", fix.delta_theta_deg));
        output::print_value("Deviation before", &format!("{:.4e}", fix.deviation_before));
        output::print_value("Deviation after", &format!("{:.4e}", fix.deviation_after));
    }

    if let Some(path) = &args.output {
        save_groups_csv(&search.groups, path)?;
        output::print_success(&format!("Groups saved to '{}'", path.display()));
    }

    Ok(())
}

fn save_groups_csv(groups: &[IntegerGroup], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create '{}'", path.display()))?;
    wtr.write_record([
        "rank",
        "reference",
        "multiplier",
        "deviation",
        "delta_theta",
        "delta_m",
        "integers",
    ])?;
    for (i, g) in groups.iter().enumerate() {
        wtr.write_record(&[
            (i + 1).to_string(),
            g.reference.to_string(),
            g.multiplier.to_string(),
            format!("{:.10e}", g.deviation),
            format!("{:.10e}", g.correction.0),
            format!("{:.10e}", g.correction.1),
            format_integers(g),
        ])?;
    }
    wtr.flush()
        .with_context(|| format!("Failed to write '{}'", path.display()))?;
    Ok(())
}
