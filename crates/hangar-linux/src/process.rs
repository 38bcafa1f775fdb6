//! 进程检测：判断是否仍有进程引用在线部署目录中的主程序。
//!
//! 匹配规则（任一命中即视为占用）：
//! - 进程可执行文件路径等于主程序路径
//! - 命令行参数中出现主程序绝对路径（`dotnet /opt/apps/app1/staging/app1.dll`）
//! - 命令行参数为主程序文件名，且进程工作目录为在线部署目录
//!
//! 按完整路径匹配，同名项目的其他环境（例如 prod 与 staging）互不影响。
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::Path;

use sysinfo::{ProcessRefreshKind, RefreshKind, System};
use tracing::info;

/// 是否存在引用 `main_binary` 的进程。
pub fn is_binary_in_use(main_binary: &Path) -> bool {
    let mut system = System::new_with_specifics(
        RefreshKind::new().with_processes(ProcessRefreshKind::everything()),
    );
    system.refresh_processes();
    for (pid, proc_) in system.processes() {
        if references_binary(proc_.exe(), proc_.cmd(), proc_.cwd(), main_binary) {
            info!(%pid, binary = %main_binary.display(), "检测到进程仍在使用主程序");
            return true;
        }
    }
    false
}

/// 单个进程是否引用主程序。
pub fn references_binary(
    exe: Option<&Path>,
    cmd: &[String],
    cwd: Option<&Path>,
    main_binary: &Path,
) -> bool {
    if exe == Some(main_binary) {
        return true;
    }
    let file_name = main_binary.file_name();
    let install_dir = main_binary.parent();
    cmd.iter().skip(1).any(|arg| {
        let arg = Path::new(arg);
        if arg == main_binary {
            return true;
        }
        arg.is_relative()
            && arg.file_name() == file_name
            && arg.parent().is_some_and(|p| p.as_os_str().is_empty())
            && cwd.is_some()
            && cwd == install_dir
    })
}
