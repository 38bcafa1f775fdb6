//! dotnet 运行器定位。
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

/// 返回 dotnet 运行器路径。
///
/// 优先使用配置值；未配置时通过 `which dotnet` 在 `PATH` 中查找。
///
/// 异常处理：
/// - 配置的路径不存在，或 `PATH` 中找不到 dotnet 时返回错误
pub fn resolve_dotnet_runner(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(anyhow!("配置的 dotnet 运行器不存在: {}", path.display()));
    }
    which::which("dotnet").map_err(|e| anyhow!("无法确定 dotnet 运行器位置: {e}"))
}
