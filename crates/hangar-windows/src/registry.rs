//! 服务注册表读取。
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::io;

use anyhow::{Context, Result};
use winreg::enums::HKEY_LOCAL_MACHINE;
use winreg::RegKey;

use crate::registration::RegisteredService;

/// 读取 `HKLM\SYSTEM\CurrentControlSet\Services\{name}` 的 `ImagePath`/`Description`。
///
/// 返回值：
/// - `Ok(None)`：服务键不存在
///
/// 异常处理：
/// - 打开键失败（非“不存在”）时返回错误
pub fn read_registered_service(service_env_name: &str) -> Result<Option<RegisteredService>> {
    let path = format!(r"SYSTEM\CurrentControlSet\Services\{service_env_name}");
    let key = match RegKey::predef(HKEY_LOCAL_MACHINE).open_subkey(&path) {
        Ok(key) => key,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!(r"打开注册表键失败: HKLM\{path}")),
    };
    Ok(Some(RegisteredService {
        image_path: key.get_value::<String, _>("ImagePath").ok(),
        description: key.get_value::<String, _>("Description").ok(),
    }))
}
