//! # 峰形函数
//!
//! 三种钟形峰形，均以 `(dx, height, width)` 参数化，`width` 是与峰形相关的
//! 平方尺度参数（不是 FWHM）：
//! - Gaussian: `h·exp(−dx²/w)`
//! - Lorentzian: `h/(1 + dx²/w)`
//! - Pseudo-Voigt（平方 Lorentz 形式）: `h/(1 + dx²/w)²`
//!
//! 峰形类型是封闭枚举，通过静态表映射到纯函数。
//!
//! ## 依赖关系
//! - 被 `peaks/decompose.rs`、`models/peak.rs`、`broadening.rs` 使用
//! - 使用 `models/pattern.rs` 的 Satellite

use crate::error::PxrdError;
use crate::models::Satellite;

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::str::FromStr;

/// 峰形函数签名：`f(dx, height, width)`
pub type ShapeFn = fn(f64, f64, f64) -> f64;

fn gaussian(dx: f64, h: f64, w: f64) -> f64 {
    h * (-dx * dx / w).exp()
}

fn lorentzian(dx: f64, h: f64, w: f64) -> f64 {
    h / (1.0 + dx * dx / w)
}

fn pseudo_voigt(dx: f64, h: f64, w: f64) -> f64 {
    let t = 1.0 + dx * dx / w;
    h / (t * t)
}

/// 静态分派表，顺序与 `ShapeKind` 的判别值一致
const SHAPE_FUNCTIONS: [ShapeFn; 3] = [gaussian, lorentzian, pseudo_voigt];

/// 峰形类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShapeKind {
    #[default]
    Gaussian = 0,
    Lorentzian = 1,
    PseudoVoigt = 2,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 3] = [
        ShapeKind::Gaussian,
        ShapeKind::Lorentzian,
        ShapeKind::PseudoVoigt,
    ];

    /// 峰形函数
    pub fn function(self) -> ShapeFn {
        SHAPE_FUNCTIONS[self as usize]
    }

    /// 在 `dx = x − x0` 处求值
    #[inline]
    pub fn eval(self, dx: f64, height: f64, width: f64) -> f64 {
        (self.function())(dx, height, width)
    }

    /// 半高全宽（与 x 同单位）
    pub fn fwhm(self, width: f64) -> f64 {
        match self {
            ShapeKind::Gaussian => 2.0 * (width * 2f64.ln()).sqrt(),
            ShapeKind::Lorentzian => 2.0 * width.sqrt(),
            ShapeKind::PseudoVoigt => 2.0 * (width * (2f64.sqrt() - 1.0)).sqrt(),
        }
    }

    /// 积分面积
    pub fn area(self, height: f64, width: f64) -> f64 {
        match self {
            ShapeKind::Gaussian => height * (PI * width).sqrt(),
            ShapeKind::Lorentzian => height * PI * width.sqrt(),
            ShapeKind::PseudoVoigt => height * PI * width.sqrt() / 2.0,
        }
    }

    /// 由面积与高度反推宽度参数
    pub fn width_from_area(self, height: f64, area: f64) -> f64 {
        let r = area / height;
        match self {
            ShapeKind::Gaussian => r * r / PI,
            ShapeKind::Lorentzian => (r / PI).powi(2),
            ShapeKind::PseudoVoigt => (2.0 * r / PI).powi(2),
        }
    }

    /// 单个峰（含附加谱线）在 `x` 处的贡献
    pub fn eval_with_satellites(
        self,
        x: f64,
        x0: f64,
        height: f64,
        width: f64,
        satellites: &[Satellite],
    ) -> f64 {
        let f = self.function();
        let mut v = f(x - x0, height, width);
        for s in satellites {
            v += f(x - x0 * s.ratio, height * s.intensity, width * s.ratio * s.ratio);
        }
        v
    }

    pub fn name(self) -> &'static str {
        match self {
            ShapeKind::Gaussian => "gaussian",
            ShapeKind::Lorentzian => "lorentzian",
            ShapeKind::PseudoVoigt => "pseudo-voigt",
        }
    }
}

impl std::fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ShapeKind {
    type Err = PxrdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gaussian" | "gauss" | "gaus" => Ok(ShapeKind::Gaussian),
            "lorentzian" | "lorentz" => Ok(ShapeKind::Lorentzian),
            "pseudo-voigt" | "pseudovoigt" | "voigt" | "pv" => Ok(ShapeKind::PseudoVoigt),
            _ => Err(PxrdError::UnsupportedShape(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_area(kind: ShapeKind, h: f64, w: f64) -> f64 {
        let half = 2000.0 * w.sqrt();
        let n = 400_000;
        let step = 2.0 * half / n as f64;
        (0..n)
            .map(|i| kind.eval(-half + (i as f64 + 0.5) * step, h, w) * step)
            .sum()
    }

    #[test]
    fn test_peak_value_is_height() {
        for kind in ShapeKind::ALL {
            assert_eq!(kind.eval(0.0, 3.5, 0.2), 3.5);
        }
    }

    #[test]
    fn test_fwhm_is_half_height() {
        let w = 0.04;
        for kind in ShapeKind::ALL {
            let half = kind.fwhm(w) / 2.0;
            assert!((kind.eval(half, 1.0, w) - 0.5).abs() < 1e-12, "{}", kind);
        }
    }

    #[test]
    fn test_area_matches_integral() {
        for kind in ShapeKind::ALL {
            let area = kind.area(2.0, 0.01);
            let numeric = numeric_area(kind, 2.0, 0.01);
            assert!((area - numeric).abs() / area < 2e-3, "{}: {} vs {}", kind, area, numeric);
            let w = kind.width_from_area(2.0, area);
            assert!((w - 0.01).abs() < 1e-12);
        }
    }

    #[test]
    fn test_satellite_contribution() {
        let sat = [Satellite {
            ratio: 1.01,
            intensity: 0.5,
        }];
        let v = ShapeKind::Gaussian.eval_with_satellites(1.01, 1.0, 2.0, 1e-6, &sat);
        // 卫星峰中心恰好位于 x = 1.01
        assert!((v - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_parse_shape() {
        assert_eq!("Gaus".parse::<ShapeKind>().unwrap(), ShapeKind::Gaussian);
        assert_eq!("pseudo-voigt".parse::<ShapeKind>().unwrap(), ShapeKind::PseudoVoigt);
        let err = "sinc".parse::<ShapeKind>().unwrap_err();
        assert!(err.is_unsupported());
    }
}
