//! # peaks 子命令实现
//!
//! ## 流程
//! 1. 读取 `x,y` 图样并换算为 sinθ 横坐标
//! 2. 迭代剔除法估计多项式背景并扣除
//! 3. 逐扇区分峰（自动峰数或 `--at` 给定的峰位）
//! 4. 打印峰表，可选导出 CSV 与尺寸 / 应变分析
//!
//! ## 依赖关系
//! - 使用 `cli/peaks.rs` 定义的参数
//! - 使用 `pxrd::peaks`、`pxrd::broadening`
//! - 使用 `utils/output.rs`, `utils/progress.rs`

use crate::cli::peaks::PeaksArgs;
use crate::parsers;
use crate::utils::{output, progress};

use anyhow::{Context, Result};
use pxrd::broadening::analyze_broadening;
use pxrd::models::{to_sin_theta, Wavelengths};
use pxrd::numeric::NelderMead;
use pxrd::peaks::{estimate_background, find_peaks, Candidate, PeakSearchReport};
use pxrd::{AnalysisConfig, PeakList, XUnits};
use std::path::Path;
use tabled::{Table, Tabled};

/// 峰表行
#[derive(Debug, Clone, Tabled)]
struct PeakRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "sin θ")]
    sin_theta: String,
    #[tabled(rename = "2θ (°)")]
    two_theta: String,
    #[tabled(rename = "d (Å)")]
    d_spacing: String,
    #[tabled(rename = "Height")]
    height: String,
    #[tabled(rename = "FWHM (2θ °)")]
    fwhm: String,
    #[tabled(rename = "Area")]
    area: String,
}

/// 执行分峰
pub fn execute(args: PeaksArgs) -> Result<()> {
    output::print_header("Peak Decomposition");

    let mut config = match &args.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(d) = args.degree {
        config.background.degree = d;
    }
    if let Some(k) = args.sigma {
        config.background.sigma_multiplier = k;
        config.sectors.sigma_multiplier = k;
    }
    if let Some(n) = args.max_bells {
        config.decompose.max_bells = n;
    }
    config.decompose.shape = args.shape.into();

    let units: XUnits = args.units.into();
    let raw = parsers::read_pattern(&args.input)?;
    output::print_info(&format!(
        "Read {} points from '{}'",
        raw.len(),
        args.input.display()
    ));
    let pattern = raw
        .to_sin_theta(units, args.wavelength)
        .context("Failed to convert the pattern to sin θ")?;
    output::print_info(&format!("Using wavelength: {:.4} Å", args.wavelength));

    let mut lines = Wavelengths::single(args.wavelength);
    if let Some(l2) = args.lambda2 {
        lines = lines.with_line(l2, args.i2);
        output::print_info(&format!("Second line: {:.4} Å (I = {})", l2, args.i2));
    }
    let satellites = lines.satellites()?;

    let candidates = if args.at.is_empty() {
        None
    } else {
        let list = args
            .at
            .iter()
            .map(|&v| {
                to_sin_theta(v, units, args.wavelength).map(|x| Candidate {
                    x,
                    fixed: args.fixed,
                })
            })
            .collect::<pxrd::Result<Vec<_>>>()?;
        Some(list)
    };

    // 背景
    let background = estimate_background(pattern.x(), pattern.y(), &config.background)?;
    if !background.converged {
        output::print_warning(&format!(
            "Background did not converge after {} iterations",
            background.iterations
        ));
    }
    output::print_info(&format!(
        "Background: degree {}, σ² = {:.4e}, {} point(s) rejected",
        background.degree,
        background.sigma2,
        background.rejected_count()
    ));
    let stripped = background.stripped(pattern.y())?;

    // 分峰
    let search = config.peak_search(candidates, satellites);
    let minimizer = NelderMead::default();
    let mut pb = progress::BarProgress::new("decomposing");
    let report = find_peaks(
        pattern.x(),
        &stripped,
        background.sigma2,
        &search,
        &minimizer,
        &mut pb,
    )?;
    pb.finish();

    print_summary(&report);
    if report.peaks.is_empty() {
        output::print_warning("No peaks found.");
        return Ok(());
    }
    print_peak_table(&report.peaks, args.wavelength);

    if let Some(path) = &args.output {
        save_peaks_csv(&report.peaks, args.wavelength, path)?;
        output::print_success(&format!("Peak list saved to '{}'", path.display()));
    }

    if args.broadening {
        let all: Vec<usize> = (0..report.peaks.len()).collect();
        let r = analyze_broadening(
            &report.peaks,
            &all,
            args.wavelength,
            args.instrumental,
            &minimizer,
        )?;
        output::print_header("Size / Strain");
        output::print_value("Coherent block size (Å)", &format!("{:.2}", r.size));
        output::print_value("Strain", &format!("{:.4e}", r.strain));
        output::print_value("Instrumental (rad)", &format!("{:.4e}", r.instrumental));
        output::print_value("Correlation", &format!("{:.6}", r.correlation));
    }

    Ok(())
}

fn print_summary(report: &PeakSearchReport) {
    output::print_separator();
    output::print_success(&format!(
        "{} sector(s): {} fitted, {} empty, {} failed",
        report.total(),
        report.fitted(),
        report.empty(),
        report.failed()
    ));
    if report.cancelled {
        output::print_warning("Search was cancelled; results are partial.");
    }
    for (range, err) in report.failures().take(10) {
        output::print_error(&format!("  [{:.5}, {:.5}]: {}", range.0, range.1, err));
    }
    if report.failed() > 10 {
        output::print_warning(&format!("  ... and {} more", report.failed() - 10));
    }
}

/// sinθ 上的峰宽换算为 2θ（度）
fn fwhm_two_theta(sin_theta: f64, fwhm_sin: f64) -> f64 {
    (2.0 * fwhm_sin / (1.0 - sin_theta * sin_theta).sqrt()).to_degrees()
}

fn print_peak_table(peaks: &PeakList, wavelength: f64) {
    let fwhm = peaks.fwhm();
    let areas = peaks.areas();
    let rows: Vec<PeakRow> = peaks
        .peaks
        .iter()
        .enumerate()
        .map(|(i, p)| PeakRow {
            index: i,
            sin_theta: format!("{:.6}", p.x0),
            two_theta: format!("{:.3}", 2.0 * p.x0.asin().to_degrees()),
            d_spacing: format!("{:.4}", wavelength / (2.0 * p.x0)),
            height: format!("{:.2}", p.height),
            fwhm: format!("{:.4}", fwhm_two_theta(p.x0, fwhm[i])),
            area: format!("{:.4e}", areas[i]),
        })
        .collect();

    output::print_header(&format!("{} Peaks ({})", rows.len(), peaks.shape));
    println!("{}", Table::new(&rows));
}

/// 保存峰列表到 CSV
fn save_peaks_csv(peaks: &PeakList, wavelength: f64, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create '{}'", path.display()))?;
    wtr.write_record(["x0", "height", "width", "stdev", "two_theta", "d", "shape"])?;
    for p in &peaks.peaks {
        wtr.write_record(&[
            format!("{:.10}", p.x0),
            format!("{:.10e}", p.height),
            format!("{:.10e}", p.width),
            format!("{:.10e}", p.stdev),
            format!("{:.6}", 2.0 * p.x0.asin().to_degrees()),
            format!("{:.6}", wavelength / (2.0 * p.x0)),
            peaks.shape.name().to_string(),
        ])?;
    }
    wtr.flush()
        .with_context(|| format!("Failed to write '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fwhm_two_theta() {
        // sinθ = 0 时 Δ(2θ) = 2·Δ(sinθ)
        assert!((fwhm_two_theta(0.0, 0.001) - 0.002f64.to_degrees()).abs() < 1e-12);
        assert!(fwhm_two_theta(0.5, 0.001) > fwhm_two_theta(0.1, 0.001));
    }
}
