//! 交换目录（制品存储）接口与文件命名约定。
//!
//! 命名约定（由上游打包流程产生，本模块只负责解析）：
//! - 程序归档：`{host}-{environment}-{project}-{runtime}-{date:mask}{extension}`
//! - 配置文件：`{server}-{environment}-{project}-{date:mask}{extension}`
//!
//! “最新”文件即按日期掩码解析出的时间戳最大的那个。
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use time::format_description::{self, BorrowedFormatItem};
use time::{Date, PrimitiveDateTime};

/// 默认日期掩码（`time` crate 格式描述语法），对应 `2024_01_01_000000`。
pub const DEFAULT_DATE_MASK: &str = "[year]_[month]_[day]_[hour][minute][second]";

/// 交换目录接口（本地磁盘或远程存储）。
pub trait ArtifactStore {
    /// 列出交换目录中的全部文件名。
    fn list_files(&self) -> Result<Vec<String>>;

    /// 将文件下载到 `destination_folder`，返回本地路径。
    fn download(&self, file_name: &str, destination_folder: &Path) -> Result<PathBuf>;
}

/// 基于本地目录的交换目录实现。
#[derive(Debug, Clone)]
pub struct LocalFolderStore {
    folder: PathBuf,
}

impl LocalFolderStore {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }
}

impl ArtifactStore for LocalFolderStore {
    fn list_files(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.folder)
            .with_context(|| format!("读取交换目录失败: {}", self.folder.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    fn download(&self, file_name: &str, destination_folder: &Path) -> Result<PathBuf> {
        let src = self.folder.join(file_name);
        let dst = destination_folder.join(file_name);
        std::fs::copy(&src, &dst)
            .with_context(|| format!("复制文件失败: {} -> {}", src.display(), dst.display()))?;
        Ok(dst)
    }
}

/// 带日期掩码的文件名模式。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNamePattern {
    prefix: String,
    date_mask: String,
    extension: String,
}

impl FileNamePattern {
    /// 程序归档模式：`{host}-{environment}-{project}-{runtime}-{date}{ext}`。
    pub fn program_archive(
        host_name: &str,
        environment_name: &str,
        project_name: &str,
        runtime_identifier: &str,
        date_mask: &str,
        extension: &str,
    ) -> Self {
        Self {
            prefix: format!("{host_name}-{environment_name}-{project_name}-{runtime_identifier}-"),
            date_mask: date_mask.to_string(),
            extension: extension.to_string(),
        }
    }

    /// 配置文件模式：`{server}-{environment}-{project}-{date}{ext}`。
    pub fn settings_file(
        server_name: &str,
        environment_name: &str,
        project_name: &str,
        date_mask: &str,
        extension: &str,
    ) -> Self {
        Self {
            prefix: format!("{server_name}-{environment_name}-{project_name}-"),
            date_mask: date_mask.to_string(),
            extension: extension.to_string(),
        }
    }

    /// 用于日志/错误信息的可读形式。
    pub fn describe(&self) -> String {
        format!("{}{{{}}}{}", self.prefix, self.date_mask, self.extension)
    }

    fn format_items(&self) -> Result<Vec<BorrowedFormatItem<'_>>> {
        format_description::parse(&self.date_mask)
            .map_err(|e| anyhow!("日期掩码无效 ({}): {e}", self.date_mask))
    }

    /// 解析文件名中的时间戳；不匹配模式时返回 `None`。
    pub fn parse_timestamp(&self, file_name: &str) -> Option<PrimitiveDateTime> {
        let middle = file_name
            .strip_prefix(&self.prefix)?
            .strip_suffix(&self.extension)?;
        let items = self.format_items().ok()?;
        PrimitiveDateTime::parse(middle, &items[..])
            .ok()
            .or_else(|| Date::parse(middle, &items[..]).ok().map(Date::midnight))
    }

    /// 在候选文件名中选出时间戳最大的匹配项。
    pub fn latest<'a>(&self, names: &'a [String]) -> Option<&'a str> {
        names
            .iter()
            .filter_map(|n| self.parse_timestamp(n).map(|ts| (ts, n.as_str())))
            .max_by_key(|(ts, _)| *ts)
            .map(|(_, n)| n)
    }
}
