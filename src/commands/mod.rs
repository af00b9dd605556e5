//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `parsers/`, `utils/` 与 `pxrd` 库
//! - 子模块: peaks, cell, integers

pub mod cell;
pub mod integers;
pub mod peaks;

use crate::cli::Commands;

use anyhow::Result;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Peaks(args) => peaks::execute(args),
        Commands::Cell(args) => cell::execute(args),
        Commands::Integers(args) => integers::execute(args),
    }
}
