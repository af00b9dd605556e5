//! # 晶胞数据模型
//!
//! 晶系、Miller 指数、(d, hkl) 反射表以及精修得到的晶胞参数。
//!
//! ## 依赖关系
//! - 被 `cell/`、`index/`、CLI 命令使用
//! - 无外部模块依赖（除 `error.rs`）

use crate::error::PxrdError;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// 晶系（封闭枚举）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrystalSystem {
    Cubic,
    Tetragonal,
    Hexagonal,
    Orthorhombic,
    Rhombohedral,
    Monoclinic,
}

impl CrystalSystem {
    pub const ALL: [CrystalSystem; 6] = [
        CrystalSystem::Cubic,
        CrystalSystem::Tetragonal,
        CrystalSystem::Hexagonal,
        CrystalSystem::Orthorhombic,
        CrystalSystem::Rhombohedral,
        CrystalSystem::Monoclinic,
    ];

    /// 线性形式中独立系数的个数
    pub fn parameter_count(self) -> usize {
        match self {
            CrystalSystem::Cubic => 1,
            CrystalSystem::Tetragonal | CrystalSystem::Hexagonal => 2,
            CrystalSystem::Rhombohedral => 2,
            CrystalSystem::Orthorhombic => 3,
            CrystalSystem::Monoclinic => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CrystalSystem::Cubic => "cubic",
            CrystalSystem::Tetragonal => "tetragonal",
            CrystalSystem::Hexagonal => "hexagonal",
            CrystalSystem::Orthorhombic => "orthorhombic",
            CrystalSystem::Rhombohedral => "rhombohedral",
            CrystalSystem::Monoclinic => "monoclinic",
        }
    }
}

impl std::fmt::Display for CrystalSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for CrystalSystem {
    type Err = PxrdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cubic" => Ok(CrystalSystem::Cubic),
            "tetragonal" | "tetra" => Ok(CrystalSystem::Tetragonal),
            "hexagonal" | "hex" => Ok(CrystalSystem::Hexagonal),
            "orthorhombic" | "orhomb" | "ortho" => Ok(CrystalSystem::Orthorhombic),
            "rhombohedral" | "trigonal-r" => Ok(CrystalSystem::Rhombohedral),
            "monoclinic" | "mono" => Ok(CrystalSystem::Monoclinic),
            _ => Err(PxrdError::UnsupportedCrystalSystem(s.to_string())),
        }
    }
}

/// Miller 指数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Miller {
    pub h: i32,
    pub k: i32,
    pub l: i32,
}

impl Miller {
    pub const fn new(h: i32, k: i32, l: i32) -> Self {
        Self { h, k, l }
    }

    pub fn is_origin(&self) -> bool {
        self.h == 0 && self.k == 0 && self.l == 0
    }

    /// 浮点形式 (h, k, l)
    pub fn as_f64(&self) -> (f64, f64, f64) {
        (self.h as f64, self.k as f64, self.l as f64)
    }
}

impl std::fmt::Display for Miller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} {} {})", self.h, self.k, self.l)
    }
}

/// 峰序号 → Miller 指数（允许部分指标化）
pub type IndexAssignment = BTreeMap<usize, Miller>;

/// 一条已指标化的反射
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    /// 晶面间距 d（Å）
    pub d: f64,
    pub hkl: Miller,
}

impl Reflection {
    pub fn new(d: f64, hkl: Miller) -> Self {
        Self { d, hkl }
    }
}

/// 晶胞参数方差估计
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CellVariances {
    pub a: Option<f64>,
    pub b: Option<f64>,
    pub c: Option<f64>,
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
    pub gamma: Option<f64>,
}

/// 精修得到的晶胞
///
/// 角度单位为度；晶系不使用的参数为 `None`。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellModel {
    pub system: CrystalSystem,
    pub a: f64,
    pub b: Option<f64>,
    pub c: Option<f64>,
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
    pub gamma: Option<f64>,
    /// 1/d² 残差的均方
    pub chi2: f64,
    pub variances: CellVariances,
}

impl CellModel {
    /// 立方晶胞
    pub fn cubic(a: f64) -> Self {
        Self::bare(CrystalSystem::Cubic, a)
    }

    /// 四方晶胞
    pub fn tetragonal(a: f64, c: f64) -> Self {
        Self {
            c: Some(c),
            ..Self::bare(CrystalSystem::Tetragonal, a)
        }
    }

    /// 六方晶胞（γ = 120°）
    pub fn hexagonal(a: f64, c: f64) -> Self {
        Self {
            c: Some(c),
            gamma: Some(120.0),
            ..Self::bare(CrystalSystem::Hexagonal, a)
        }
    }

    /// 正交晶胞
    pub fn orthorhombic(a: f64, b: f64, c: f64) -> Self {
        Self {
            b: Some(b),
            c: Some(c),
            ..Self::bare(CrystalSystem::Orthorhombic, a)
        }
    }

    /// 菱方晶胞（菱面体轴）
    pub fn rhombohedral(a: f64, alpha: f64) -> Self {
        Self {
            alpha: Some(alpha),
            ..Self::bare(CrystalSystem::Rhombohedral, a)
        }
    }

    /// 单斜晶胞（b 为唯一轴）
    pub fn monoclinic(a: f64, b: f64, c: f64, beta: f64) -> Self {
        Self {
            b: Some(b),
            c: Some(c),
            beta: Some(beta),
            ..Self::bare(CrystalSystem::Monoclinic, a)
        }
    }

    fn bare(system: CrystalSystem, a: f64) -> Self {
        Self {
            system,
            a,
            b: None,
            c: None,
            alpha: None,
            beta: None,
            gamma: None,
            chi2: 0.0,
            variances: CellVariances::default(),
        }
    }

    /// 13 元组：(a, b, c, α, β, γ, χ², σ²_a, σ²_b, σ²_c, σ²_α, σ²_β, σ²_γ)
    pub fn to_tuple(&self) -> [Option<f64>; 13] {
        let v = &self.variances;
        [
            Some(self.a),
            self.b,
            self.c,
            self.alpha,
            self.beta,
            self.gamma,
            Some(self.chi2),
            v.a,
            v.b,
            v.c,
            v.alpha,
            v.beta,
            v.gamma,
        ]
    }
}

/// 13 元组各项名称
pub const CELL_TUPLE_LABELS: [&str; 13] = [
    "a", "b", "c", "α", "β", "γ", "χ²", "σ²_a", "σ²_b", "σ²_c", "σ²_α", "σ²_β", "σ²_γ",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crystal_system() {
        assert_eq!("hex".parse::<CrystalSystem>().unwrap(), CrystalSystem::Hexagonal);
        assert_eq!("Cubic".parse::<CrystalSystem>().unwrap(), CrystalSystem::Cubic);
        for cs in CrystalSystem::ALL {
            assert_eq!(cs.name().parse::<CrystalSystem>().unwrap(), cs);
        }
        let err = "triclinic".parse::<CrystalSystem>().unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_cell_tuple_slots() {
        let cell = CellModel::hexagonal(3.1, 5.2);
        let t = cell.to_tuple();
        assert_eq!(t[0], Some(3.1));
        assert_eq!(t[1], None);
        assert_eq!(t[2], Some(5.2));
        assert_eq!(t[5], Some(120.0));
        assert_eq!(t[6], Some(0.0));
        assert!(t[7..].iter().all(|v| v.is_none()));
    }
}
