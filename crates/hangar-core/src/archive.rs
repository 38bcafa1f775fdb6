//! 程序归档：描述、解压与版本读取。
//!
//! 说明：
//! - 归档解压到 `work_folder/<去掉扩展名的文件名>`，替换成功后该目录与归档文件都会被删除
//! - 版本号取自主程序内嵌版本资源中的 `FileVersion` 字符串
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

/// 一次更新过程中的归档描述。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveDescriptor {
    archive_path: PathBuf,
    extraction_folder: PathBuf,
}

impl ArchiveDescriptor {
    /// 参数：
    /// - `work_folder`：工作目录（归档已下载到此处）
    /// - `file_name`：归档文件名，例如 `host-staging-app1-linux-x64-2024_01_01_000000.zip`
    pub fn new(work_folder: &Path, file_name: &str) -> Self {
        let stem = Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_string());
        Self {
            archive_path: work_folder.join(file_name),
            extraction_folder: work_folder.join(stem),
        }
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn extraction_folder(&self) -> &Path {
        &self.extraction_folder
    }
}

/// 归档解压接口。
pub trait ArchiveExtractor {
    /// 将 `archive` 解压到 `destination`（目录不存在时创建）。
    fn extract(&self, archive: &Path, destination: &Path) -> Result<()>;
}

/// 基于 `zip` crate 的解压实现。
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn extract(&self, archive: &Path, destination: &Path) -> Result<()> {
        let file =
            File::open(archive).with_context(|| format!("打开归档失败: {}", archive.display()))?;
        let mut zip = zip::ZipArchive::new(file)
            .with_context(|| format!("读取 zip 归档失败: {}", archive.display()))?;
        std::fs::create_dir_all(destination)
            .with_context(|| format!("创建解压目录失败: {}", destination.display()))?;

        for i in 0..zip.len() {
            let mut entry = zip
                .by_index(i)
                .with_context(|| format!("读取 zip 条目失败: {i}"))?;
            // 拒绝路径穿越的条目
            let Some(relative) = entry.enclosed_name() else {
                return Err(anyhow!("zip 条目路径不安全: {}", entry.name()));
            };
            let out_path = destination.join(relative);

            if entry.is_dir() {
                std::fs::create_dir_all(&out_path)
                    .with_context(|| format!("创建目录失败: {}", out_path.display()))?;
                continue;
            }
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("创建目录失败: {}", parent.display()))?;
            }
            let mut out = File::create(&out_path)
                .with_context(|| format!("创建文件失败: {}", out_path.display()))?;
            std::io::copy(&mut entry, &mut out)
                .with_context(|| format!("写入文件失败: {}", out_path.display()))?;

            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode))
                    .with_context(|| format!("设置文件权限失败: {}", out_path.display()))?;
            }
        }
        Ok(())
    }
}

/// 从主程序的版本资源中读取 `FileVersion`。
///
/// 实现方式：
/// - 在文件字节中查找 UTF-16LE 编码的键 `FileVersion\0`
/// - 键后按 4 字节边界对齐，读取以 NUL 结尾的 UTF-16LE 值
/// - 跳过值为空的出现位置（字符串表中可能存在占位条目）
///
/// 异常处理：
/// - 文件读取失败或未找到有效版本字符串时返回错误
pub fn read_program_version(binary: &Path) -> Result<String> {
    let bytes =
        std::fs::read(binary).with_context(|| format!("读取主程序失败: {}", binary.display()))?;
    find_file_version(&bytes).ok_or_else(|| anyhow!("主程序中未找到 FileVersion: {}", binary.display()))
}

fn utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

fn find_file_version(bytes: &[u8]) -> Option<String> {
    let key = utf16le("FileVersion\0");
    let mut from = 0;
    while let Some(pos) = find_subslice(&bytes[from..], &key) {
        let key_start = from + pos;
        let value_start = (key_start + key.len() + 3) & !3;
        if let Some(value) = read_utf16z(bytes, value_start) {
            if !value.is_empty() {
                return Some(value);
            }
        }
        from = key_start + 2;
    }
    None
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn read_utf16z(bytes: &[u8], start: usize) -> Option<String> {
    const MAX_CHARS: usize = 64;
    let mut units = Vec::new();
    let mut at = start;
    loop {
        let pair = bytes.get(at..at + 2)?;
        let unit = u16::from_le_bytes([pair[0], pair[1]]);
        if unit == 0 {
            break;
        }
        units.push(unit);
        if units.len() > MAX_CHARS {
            return None;
        }
        at += 2;
    }
    let text = String::from_utf16(&units).ok()?;
    let text = text.trim();
    if text.chars().any(char::is_control) {
        return None;
    }
    Some(text.to_string())
}
