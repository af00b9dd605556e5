//! # CSV 表格解析器
//!
//! ## 支持的表格
//! ```text
//! x,y            # 衍射图样
//! d,h,k,l        # 已指标化的反射
//! x              # 峰位（也接受 peaks 命令导出的 x0 列）
//! ```
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `csv` + `serde` 反序列化

use anyhow::{Context, Result};
use pxrd::models::{Miller, Pattern, Reflection};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct XyRow {
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct ReflectionRow {
    d: f64,
    h: i32,
    k: i32,
    l: i32,
}

#[derive(Debug, Deserialize)]
struct PositionRow {
    #[serde(alias = "x0")]
    x: f64,
}

fn parse_rows<T: DeserializeOwned, R: Read>(reader: R) -> Result<Vec<T>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);
    rdr.deserialize()
        .enumerate()
        .map(|(i, row)| row.with_context(|| format!("bad row {}", i + 1)))
        .collect()
}

fn open(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("Failed to open '{}'", path.display()))
}

/// 从 `x,y` 内容解析图样
pub fn parse_pattern<R: Read>(reader: R) -> Result<Pattern> {
    let rows: Vec<XyRow> = parse_rows(reader)?;
    let (x, y) = rows.into_iter().map(|r| (r.x, r.y)).unzip();
    Ok(Pattern::new(x, y)?)
}

pub fn read_pattern(path: &Path) -> Result<Pattern> {
    parse_pattern(open(path)?).with_context(|| format!("Failed to parse '{}'", path.display()))
}

/// 从 `d,h,k,l` 内容解析反射表
pub fn parse_reflections<R: Read>(reader: R) -> Result<Vec<Reflection>> {
    let rows: Vec<ReflectionRow> = parse_rows(reader)?;
    Ok(rows
        .into_iter()
        .map(|r| Reflection::new(r.d, Miller::new(r.h, r.k, r.l)))
        .collect())
}

pub fn read_reflections(path: &Path) -> Result<Vec<Reflection>> {
    parse_reflections(open(path)?).with_context(|| format!("Failed to parse '{}'", path.display()))
}

pub fn parse_positions<R: Read>(reader: R) -> Result<Vec<f64>> {
    let rows: Vec<PositionRow> = parse_rows(reader)?;
    Ok(rows.into_iter().map(|r| r.x).collect())
}

pub fn read_positions(path: &Path) -> Result<Vec<f64>> {
    parse_positions(open(path)?).with_context(|| format!("Failed to parse '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pattern() {
        let text = "# scan\nx, y\n10.0, 5\n10.02, 6\n10.04, 4\n";
        let p = parse_pattern(text.as_bytes()).unwrap();
        assert_eq!(p.len(), 3);
        assert_eq!(p.y()[1], 6.0);

        let unsorted = "x,y\n2,1\n1,1\n";
        assert!(parse_pattern(unsorted.as_bytes()).is_err());
    }

    #[test]
    fn test_parse_reflections() {
        let text = "d,h,k,l\n3.5,1,0,0\n2.4749,1,1,0\n";
        let r = parse_reflections(text.as_bytes()).unwrap();
        assert_eq!(r.len(), 2);
        assert_eq!(r[1].hkl, Miller::new(1, 1, 0));
        assert!(parse_reflections("d,h,k,l\n3.5,x,0,0\n".as_bytes()).is_err());
    }

    #[test]
    fn test_positions_accept_peak_export() {
        let text = "x0,height,width,stdev\n0.2,1,1e-6,0.1\n0.3,2,1e-6,0.1\n";
        assert_eq!(parse_positions(text.as_bytes()).unwrap(), vec![0.2, 0.3]);
    }
}
