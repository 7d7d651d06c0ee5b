// apps/hdm_cli/src/commands/run.rs

//! 运行项目模拟

use crate::model::DemoModel;
use anyhow::Context;
use clap::Args;
use hdm_engine::{Domain, Project, ProjectInput};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// 运行参数
#[derive(Args)]
pub struct RunArgs {
    /// 项目输入文件路径
    pub project: PathBuf,

    /// 处理器总预算
    #[arg(long, default_value_t = 2)]
    pub nproc: usize,

    /// 为子域保留的处理器数（0 表示按半数划分）
    #[arg(long = "nproc-child", default_value_t = 0)]
    pub nproc_child: usize,

    /// 时间步总数
    #[arg(long, default_value_t = 24)]
    pub nts: u32,

    /// 每个域的单元数
    #[arg(long, default_value_t = 64)]
    pub cells: usize,
}

/// 执行运行命令
pub fn execute(args: RunArgs) -> anyhow::Result<()> {
    let input = ProjectInput::read(&args.project)
        .with_context(|| format!("failed to read project file {}", args.project.display()))?;

    let mut project: Project<DemoModel> = Project::new(&input.project_id);
    for spec in &input.domains {
        let model = DemoModel::with_params(spec, args.nts, args.cells);
        project.add_domain(Domain::new(spec.clone(), model));
    }

    let started = Instant::now();
    project.run(args.nproc, args.nproc_child)?;
    info!(
        elapsed_s = started.elapsed().as_secs_f64(),
        "simulation finished"
    );
    Ok(())
}
