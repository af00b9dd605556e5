//! # 衍射图样数据模型
//!
//! 定义有序的 `(x, y)` 测量序列及其横坐标单位、波长元数据。
//! 核心只从调用方的数组派生新数组，从不原地修改。
//!
//! ## 依赖关系
//! - 被 `peaks/`、`index/`、CLI 命令使用
//! - 使用 `error.rs`

use crate::error::{ensure_same_len, PxrdError, Result};

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// 横坐标单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum XUnits {
    /// 衍射角 2θ（度）
    TwoTheta,
    /// 布拉格角 θ（度）
    Theta,
    /// sin θ
    SinTheta,
    /// 散射矢量 q = 4π sinθ / λ（Å⁻¹）
    Q,
}

/// 衍射图样
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl Pattern {
    /// 创建图样：长度相等、非空、有限值、x 严格递增
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        if x.is_empty() {
            return Err(PxrdError::EmptyInput("pattern".to_string()));
        }
        ensure_same_len("pattern y", x.len(), y.len())?;

        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(PxrdError::InvalidInput(
                "pattern contains non-finite values".to_string(),
            ));
        }
        if let Some(i) = x.windows(2).position(|w| w[1] <= w[0]) {
            return Err(PxrdError::InvalidInput(format!(
                "x must be strictly increasing (x[{}] = {} >= x[{}] = {})",
                i,
                x[i],
                i + 1,
                x[i + 1]
            )));
        }

        Ok(Self { x, y })
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// 转换为 sinθ 横坐标（y 不变）
    pub fn to_sin_theta(&self, units: XUnits, wavelength: f64) -> Result<Pattern> {
        let x = self
            .x
            .iter()
            .map(|&v| to_sin_theta(v, units, wavelength))
            .collect::<Result<Vec<_>>>()?;
        // 2θ > 180° 之类的输入会破坏单调性，交给 new() 检查
        Pattern::new(x, self.y.clone())
    }

    /// 转换为 q 横坐标（y 不变）
    pub fn to_q(&self, units: XUnits, wavelength: f64) -> Result<Pattern> {
        check_wavelength(wavelength)?;
        let x = self
            .x
            .iter()
            .map(|&v| to_sin_theta(v, units, wavelength).map(|s| 4.0 * PI * s / wavelength))
            .collect::<Result<Vec<_>>>()?;
        Pattern::new(x, self.y.clone())
    }
}

fn check_wavelength(wavelength: f64) -> Result<()> {
    if !(wavelength.is_finite() && wavelength > 0.0) {
        return Err(PxrdError::InvalidInput(format!(
            "wavelength must be positive, got {}",
            wavelength
        )));
    }
    Ok(())
}

/// 单个横坐标值转换为 sinθ
pub fn to_sin_theta(value: f64, units: XUnits, wavelength: f64) -> Result<f64> {
    let s = match units {
        XUnits::TwoTheta => (value / 2.0).to_radians().sin(),
        XUnits::Theta => value.to_radians().sin(),
        XUnits::SinTheta => value,
        XUnits::Q => {
            check_wavelength(wavelength)?;
            value * wavelength / (4.0 * PI)
        }
    };
    if !(0.0..=1.0).contains(&s) {
        return Err(PxrdError::InvalidInput(format!(
            "value {} in {:?} is outside the diffraction range",
            value, units
        )));
    }
    Ok(s)
}

/// 布拉格定律：d = λ / (2 sinθ)
pub fn d_spacing(sin_theta: f64, wavelength: f64) -> Result<f64> {
    check_wavelength(wavelength)?;
    if !(sin_theta > 0.0 && sin_theta <= 1.0) {
        return Err(PxrdError::InvalidInput(format!(
            "sin(theta) = {} is outside (0, 1]",
            sin_theta
        )));
    }
    Ok(wavelength / (2.0 * sin_theta))
}

/// 附加谱线（如 Kα2）：相对主波长的比值与相对强度
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Satellite {
    /// λᵢ / λ₁
    pub ratio: f64,
    /// Iᵢ / I₁
    pub intensity: f64,
}

/// 附加谱线的绝对波长（Å）与相对强度
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralLine {
    pub lambda: f64,
    pub intensity: f64,
}

/// 仪器波长元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wavelengths {
    /// 主波长 λ₁（Å）
    pub lambda1: f64,
    pub lines: Vec<SpectralLine>,
}

impl Wavelengths {
    pub fn single(lambda1: f64) -> Self {
        Self {
            lambda1,
            lines: Vec::new(),
        }
    }

    pub fn with_line(mut self, lambda: f64, intensity: f64) -> Self {
        self.lines.push(SpectralLine { lambda, intensity });
        self
    }

    /// 以 sinθ 或 q 为横坐标时的附加谱线
    pub fn satellites(&self) -> Result<Vec<Satellite>> {
        check_wavelength(self.lambda1)?;
        self.lines
            .iter()
            .map(|&SpectralLine { lambda, intensity }| {
                check_wavelength(lambda)?;
                if !(intensity.is_finite() && intensity >= 0.0) {
                    return Err(PxrdError::InvalidInput(format!(
                        "relative intensity must be non-negative, got {}",
                        intensity
                    )));
                }
                Ok(Satellite {
                    ratio: lambda / self.lambda1,
                    intensity,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_validation() {
        assert!(Pattern::new(vec![1.0, 2.0], vec![0.0, 1.0]).is_ok());

        let err = Pattern::new(vec![1.0, 2.0], vec![0.0]).unwrap_err();
        assert!(err.is_contract_violation());

        let err = Pattern::new(vec![], vec![]).unwrap_err();
        assert_eq!(err, PxrdError::EmptyInput("pattern".to_string()));

        assert!(Pattern::new(vec![1.0, 1.0], vec![0.0, 1.0]).is_err());
        assert!(Pattern::new(vec![1.0, f64::NAN], vec![0.0, 1.0]).is_err());
    }

    #[test]
    fn test_unit_conversion() {
        let p = Pattern::new(vec![30.0, 60.0], vec![1.0, 2.0]).unwrap();
        let s = p.to_sin_theta(XUnits::TwoTheta, 1.5406).unwrap();
        assert!((s.x()[0] - 15f64.to_radians().sin()).abs() < 1e-12);
        assert!((s.x()[1] - 0.5).abs() < 1e-12);
        assert_eq!(s.y(), p.y());

        let q = p.to_q(XUnits::TwoTheta, 1.5406).unwrap();
        assert!((q.x()[1] - 4.0 * PI * 0.5 / 1.5406).abs() < 1e-12);
        let back = q.to_sin_theta(XUnits::Q, 1.5406).unwrap();
        assert!((back.x()[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_d_spacing() {
        let d = d_spacing(0.5, 1.5406).unwrap();
        assert!((d - 1.5406).abs() < 1e-12);
        assert!(d_spacing(0.0, 1.5406).is_err());
    }

    #[test]
    fn test_satellites() {
        let w = Wavelengths::single(1.5406).with_line(1.5444, 0.5);
        let s = w.satellites().unwrap();
        assert_eq!(s.len(), 1);
        assert!((s[0].ratio - 1.5444 / 1.5406).abs() < 1e-15);
        assert_eq!(s[0].intensity, 0.5);
        assert_eq!(
            w.lines,
            vec![SpectralLine {
                lambda: 1.5444,
                intensity: 0.5
            }]
        );

        let bad = Wavelengths::single(1.5406).with_line(1.5444, -1.0);
        assert!(bad.satellites().is_err());
    }
}
