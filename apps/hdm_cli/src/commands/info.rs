// apps/hdm_cli/src/commands/info.rs

//! 显示项目输入文件信息

use anyhow::Context;
use clap::Args;
use hdm_engine::ProjectInput;
use std::path::PathBuf;

/// 信息参数
#[derive(Args)]
pub struct InfoArgs {
    /// 项目输入文件路径
    pub project: PathBuf,
}

/// 执行信息命令
pub fn execute(args: InfoArgs) -> anyhow::Result<()> {
    let input = ProjectInput::read(&args.project)
        .with_context(|| format!("failed to read project file {}", args.project.display()))?;

    println!("project: {}", input.project_id);
    println!("header:  {}", input.header);
    println!("domains: {}", input.nd);
    for spec in &input.domains {
        match &spec.parent_id {
            Some(parent) => println!(
                "  {:<12} {:<24} {:<24} parent={}",
                spec.id,
                spec.path.display(),
                spec.output_dir.display(),
                parent
            ),
            None => println!(
                "  {:<12} {:<24} {:<24} (root)",
                spec.id,
                spec.path.display(),
                spec.output_dir.display()
            ),
        }
    }
    Ok(())
}
