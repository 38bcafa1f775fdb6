//! 进程检测：按可执行文件完整路径（不区分大小写）匹配主程序。
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::Path;

use sysinfo::{ProcessRefreshKind, RefreshKind, System};
use tracing::info;

/// 是否存在以 `main_binary` 为可执行文件的进程。
///
/// 限制：
/// - 无权读取路径的进程（其他会话的系统进程）会被跳过
pub fn is_binary_in_use(main_binary: &Path) -> bool {
    let mut system = System::new_with_specifics(
        RefreshKind::new().with_processes(ProcessRefreshKind::everything()),
    );
    system.refresh_processes();
    let needle = main_binary.to_string_lossy().to_lowercase();
    for (pid, proc_) in system.processes() {
        let Some(exe) = proc_.exe() else {
            continue;
        };
        if exe.to_string_lossy().to_lowercase() == needle {
            info!(%pid, binary = %main_binary.display(), "检测到进程仍在使用主程序");
            return true;
        }
    }
    false
}
