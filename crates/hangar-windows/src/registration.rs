//! 服务注册信息比较（纯函数，所有平台均可测试）。
//!
//! 实际注册信息取自 `HKLM\SYSTEM\CurrentControlSet\Services\{name}` 的 `ImagePath`/`Description`。
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::Path;

use hangar_core::platform::ServiceRegistrationDescriptor;

/// 注册表中的服务注册信息。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisteredService {
    pub image_path: Option<String>,
    pub description: Option<String>,
}

/// 去掉 `ImagePath` 两侧的空白与引号（路径含空格时服务管理器会加引号）。
pub fn normalize_image_path(raw: &str) -> &str {
    raw.trim().trim_matches('"').trim()
}

/// `ImagePath` 是否指向期望的主程序（Windows 路径不区分大小写）。
pub fn image_path_matches(actual: &str, expected: &Path) -> bool {
    let expected = expected.to_string_lossy();
    normalize_image_path(actual).eq_ignore_ascii_case(expected.trim())
}

/// 逐字段比较实际与期望的注册信息。
pub fn is_registration_proper(
    actual: &RegisteredService,
    expected: &ServiceRegistrationDescriptor,
) -> bool {
    let Some(image_path) = actual.image_path.as_deref() else {
        return false;
    };
    if !image_path_matches(image_path, &expected.binary_path) {
        return false;
    }
    actual.description.as_deref().unwrap_or_default().trim() == expected.description
}
