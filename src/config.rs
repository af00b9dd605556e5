//! # 分析配置
//!
//! 汇总各阶段的参数，作为显式的值传入各个操作，没有全局可变设置。
//! 可以从 JSON 读取，缺省字段取默认值：
//!
//! ```json
//! { "background": { "degree": 3 }, "decompose": { "shape": "Lorentzian" } }
//! ```
//!
//! ## 依赖关系
//! - 被 CLI 各命令使用
//! - 使用 `serde_json` 解析

use crate::error::{PxrdError, Result};
use crate::index::IntegerSearchOptions;
use crate::models::Satellite;
use crate::peaks::background::BackgroundOptions;
use crate::peaks::decompose::DecomposeOptions;
use crate::peaks::search::{Candidate, PeakSearchConfig};
use crate::peaks::sectors::SectorOptions;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 全部分析参数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub background: BackgroundOptions,
    pub sectors: SectorOptions,
    pub decompose: DecomposeOptions,
    pub integers: IntegerSearchOptions,
}

impl AnalysisConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| PxrdError::InvalidInput(format!("analysis config: {}", e)))
    }

    /// 读取 JSON 配置文件
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            PxrdError::InvalidInput(format!("failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PxrdError::InvalidInput(format!("analysis config: {}", e)))
    }

    /// 峰搜索阶段的配置
    pub fn peak_search(
        &self,
        candidates: Option<Vec<Candidate>>,
        satellites: Vec<Satellite>,
    ) -> PeakSearchConfig {
        PeakSearchConfig {
            sectors: self.sectors.clone(),
            decompose: self.decompose.clone(),
            candidates,
            satellites,
        }
    }
}
