//! # pxrd - 粉末 X 射线衍射分析命令行工具
//!
//! 数值核心在库 `pxrd` 中，这里只负责参数解析、文件读写与输出。
//!
//! ## 子命令
//! - `peaks` - 背景扣除与分峰
//! - `cell` - 晶胞精修（可选角度校正、衍射预测）
//! - `integers` - sin²θ 比值中的整数关系
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   ├── parsers/    (CSV 输入)
//!   └── utils/      (输出与进度条)
//! ```

mod cli;
mod commands;
mod parsers;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
