//! 提权/权限相关检测。
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use anyhow::Result;
use windows::Win32::UI::Shell::IsUserAnAdmin;

/// 判断当前进程是否以管理员权限运行。
///
/// 异常处理：
/// - 该 Win32 API 本身不返回错误码；此处保留 `Result` 以统一上层调用风格。
pub fn is_running_as_admin() -> Result<bool> {
    unsafe { Ok(IsUserAnAdmin().as_bool()) }
}
