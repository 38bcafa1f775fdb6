//! 配置文件载荷与版本标记。
//!
//! 配置文件为 JSON，版本标记位于 `VersionInfo.AppSettingsVersion`（字符串）。
//! 缺少版本标记时不能走“版本相同则跳过”的快速路径，但不会阻止更新。
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use serde_json::Value;

/// 版本标记在 JSON 中的位置（JSON Pointer）。
pub const VERSION_TOKEN_POINTER: &str = "/VersionInfo/AppSettingsVersion";

/// 配置文件载荷：文件名 + 文本内容。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsPayload {
    file_name: String,
    content: String,
}

impl SettingsPayload {
    pub fn new(file_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// 内容中嵌入的版本标记。
    pub fn version_token(&self) -> Option<String> {
        read_version_token(&self.content)
    }
}

/// 从 JSON 文本中读取 `VersionInfo.AppSettingsVersion`。
///
/// 返回值：
/// - JSON 无法解析、字段不存在或不是字符串时返回 `None`
pub fn read_version_token(json: &str) -> Option<String> {
    // 兼容带 BOM 的配置文件
    let json = json.trim_start_matches('\u{feff}');
    let value: Value = serde_json::from_str(json).ok()?;
    value
        .pointer(VERSION_TOKEN_POINTER)
        .and_then(Value::as_str)
        .map(str::to_string)
}
