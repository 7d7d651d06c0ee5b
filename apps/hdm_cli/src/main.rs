// apps/hdm_cli/src/main.rs

//! OpenHDM 命令行宿主程序
//!
//! 核心框架不定义命令行；本程序是随仓库发布的宿主：读取项目
//! 输入文件，用演示模型驱动一次多域并发模拟，并由调用方选择
//! 处理器预算。

mod commands;
mod model;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// OpenHDM 多域水动力模拟宿主
#[derive(Parser)]
#[command(name = "hdm_cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "OpenHDM hierarchical multi-domain simulation host", long_about = None)]
struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行项目模拟
    Run(commands::run::RunArgs),
    /// 显示项目输入文件信息
    Info(commands::info::InfoArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::Info(args) => commands::info::execute(args),
    }
}
