//! 文件/目录访问权限（基于 `icacls`）。
//!
//! Windows 上“所有权”以为服务账户授予读/写/执行权限的 ACL 规则表达；组名不使用。
//!
//! 权限要求：
//! - 需要管理员权限
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::Path;

/// 构造 `icacls` 授权参数。
///
/// 参数：
/// - `recursive`：目录授权时为 `true`，规则向子目录/文件继承并作用于现有内容
pub fn grant_args(path: &Path, user: &str, recursive: bool) -> Vec<String> {
    let mut args = vec![path.to_string_lossy().into_owned(), "/grant".to_string()];
    if recursive {
        args.push(format!("{user}:(OI)(CI)(RX,W)"));
        args.push("/T".to_string());
    } else {
        args.push(format!("{user}:(RX,W)"));
    }
    args.push("/Q".to_string());
    args
}

#[cfg(windows)]
pub use self::imp::IcaclsOwnership;

#[cfg(windows)]
mod imp {
    use std::path::Path;
    use std::process::Command;

    use anyhow::{anyhow, Context, Result};
    use hangar_core::platform::{ownership_target, OwnershipManager, OwnershipSpec};
    use tracing::info;

    use super::grant_args;

    /// 通过 `icacls /grant` 授权。
    #[derive(Debug, Clone, Copy, Default)]
    pub struct IcaclsOwnership;

    impl IcaclsOwnership {
        fn grant(&self, path: &Path, spec: &OwnershipSpec, recursive: bool) -> Result<()> {
            let Some(user) = ownership_target(path, spec)? else {
                return Ok(());
            };
            info!(%user, path = %path.display(), recursive, "授予服务账户访问权限");
            run_icacls(&grant_args(path, user, recursive))
        }
    }

    impl OwnershipManager for IcaclsOwnership {
        fn change_file_owner(&self, path: &Path, spec: &OwnershipSpec) -> Result<()> {
            self.grant(path, spec, false)
        }

        fn change_folder_owner_recursive(&self, path: &Path, spec: &OwnershipSpec) -> Result<()> {
            self.grant(path, spec, true)
        }
    }

    fn run_icacls(args: &[String]) -> Result<()> {
        let out = Command::new("icacls")
            .args(args)
            .output()
            .context("执行 icacls 失败")?;
        if out.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&out.stderr);
        let stdout = String::from_utf8_lossy(&out.stdout);
        Err(anyhow!(
            "icacls 执行失败: {}\n{}\n{}",
            out.status,
            stdout,
            stderr
        ))
    }
}
