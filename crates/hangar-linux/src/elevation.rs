//! 权限检测。
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use anyhow::Result;

/// 当前进程是否以 root 身份运行。
///
/// 异常处理：
/// - `geteuid` 不会失败；保留 `Result` 以统一上层调用风格
#[cfg(unix)]
pub fn is_running_as_root() -> Result<bool> {
    // SAFETY: geteuid 无参数、无副作用
    Ok(unsafe { libc::geteuid() } == 0)
}

#[cfg(not(unix))]
pub fn is_running_as_root() -> Result<bool> {
    Ok(false)
}
