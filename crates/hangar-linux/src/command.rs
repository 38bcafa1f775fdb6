//! 外部命令执行（systemctl / chown）。
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::process::{Command, Output};

use anyhow::{anyhow, Context, Result};
use tracing::debug;

/// 执行外部命令，仅返回原始输出（不检查退出码）。
pub fn run_raw(program: &str, args: &[&str]) -> Result<Output> {
    debug!(%program, ?args, "执行外部命令");
    Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("执行 {program} 失败"))
}

/// 执行外部命令并将非 0 退出码汇总为 `anyhow::Error`。
///
/// 异常处理：
/// - 启动失败：返回错误（通常是程序缺失或权限问题）
/// - 执行失败：返回错误并携带 stdout/stderr，便于日志与人工复现
pub fn run_checked(program: &str, args: &[&str]) -> Result<()> {
    let out = run_raw(program, args)?;
    if out.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&out.stderr);
    let stdout = String::from_utf8_lossy(&out.stdout);
    Err(anyhow!(
        "{program} {} 执行失败: {}\n{}\n{}",
        args.join(" "),
        out.status,
        stdout.trim(),
        stderr.trim()
    ))
}
