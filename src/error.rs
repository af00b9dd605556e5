//! # 统一错误处理模块
//!
//! 定义 pxrd 数值核心的所有错误类型，使用 `thiserror` 派生。
//! 错误分为三类：输入约定违规、数值奇异、配置不支持。
//! 优化器不收敛不是错误，调用方通过 chi² / 偏差判断拟合质量。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use serde::Serialize;
use thiserror::Error;

/// pxrd 统一错误类型
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum PxrdError {
    // ─────────────────────────────────────────────────────────────
    // 输入约定违规
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Length mismatch for {what}: expected {expected}, found {found}")]
    LengthMismatch {
        what: String,
        expected: usize,
        found: usize,
    },

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Polynomial degree {degree} needs more than {points} points")]
    DegreeTooHigh { degree: usize, points: usize },

    // ─────────────────────────────────────────────────────────────
    // 数值奇异 / 模型不可解
    // ─────────────────────────────────────────────────────────────
    #[error("Singular normal matrix: {0}")]
    Singular(String),

    #[error("Unsolvable model: {0}")]
    Unsolvable(String),

    // ─────────────────────────────────────────────────────────────
    // 不支持的配置
    // ─────────────────────────────────────────────────────────────
    #[error("Unsupported crystal system: {0}")]
    UnsupportedCrystalSystem(String),

    #[error("Unsupported shape function: {0}")]
    UnsupportedShape(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl PxrdError {
    /// 输入约定违规（长度不符、空数组、多项式阶数过高等）
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            PxrdError::InvalidInput(_)
                | PxrdError::LengthMismatch { .. }
                | PxrdError::EmptyInput(_)
                | PxrdError::DegreeTooHigh { .. }
        )
    }

    /// 数值奇异（法方程矩阵奇异、背景剔除后点数不足等）
    pub fn is_numerical(&self) -> bool {
        matches!(self, PxrdError::Singular(_) | PxrdError::Unsolvable(_))
    }

    /// 查找失败（未知晶系、未知峰形）
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            PxrdError::UnsupportedCrystalSystem(_)
                | PxrdError::UnsupportedShape(_)
                | PxrdError::Unsupported(_)
        )
    }
}

/// 检查参与同一次拟合的数组长度一致
pub fn ensure_same_len(what: &str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(PxrdError::LengthMismatch {
            what: what.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, PxrdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let e = PxrdError::LengthMismatch {
            what: "y".to_string(),
            expected: 3,
            found: 2,
        };
        assert!(e.is_contract_violation());
        assert!(!e.is_numerical());

        assert!(PxrdError::Singular("x".into()).is_numerical());
        assert!(PxrdError::UnsupportedCrystalSystem("triclinic".into()).is_unsupported());
        assert!(!PxrdError::Unsolvable("x".into()).is_unsupported());
    }

    #[test]
    fn test_ensure_same_len() {
        assert!(ensure_same_len("weights", 4, 4).is_ok());
        let err = ensure_same_len("weights", 4, 5).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Length mismatch for weights: expected 4, found 5"
        );
    }
}
