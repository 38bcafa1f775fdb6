//! 路径与目录辅助函数。
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

/// 将配置中的路径字段解析为实际路径。
///
/// 参数：
/// - `base`：相对路径的基准目录（通常是配置文件所在目录）
/// - `raw`：配置中的路径字符串
///
/// 返回值：
/// - `raw` 为绝对路径：直接返回
/// - `raw` 为相对路径：返回 `base.join(raw)`
///
/// 异常处理：
/// - `raw` 为空字符串时返回错误，避免误把基准目录本身当作安装根目录。
pub fn resolve_path(base: &Path, raw: &str) -> Result<PathBuf> {
    if raw.trim().is_empty() {
        return Err(anyhow!("空路径"));
    }
    let p = PathBuf::from(raw);
    if p.is_absolute() {
        Ok(p)
    } else {
        Ok(base.join(p))
    }
}

/// 判断目录是否为空（不存在视为空）。
pub fn is_dir_empty(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    let mut entries =
        std::fs::read_dir(path).with_context(|| format!("读取目录失败: {}", path.display()))?;
    Ok(entries.next().is_none())
}
