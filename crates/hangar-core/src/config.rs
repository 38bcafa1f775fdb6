//! 部署工具配置（hangar.json）模型与加载。
//!
//! 约定：
//! - 路径字段允许相对路径，按配置文件所在目录解析
//! - 可选字段通过 `#[serde(default)]` 提供默认值，便于配置向前兼容
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::artifact::DEFAULT_DATE_MASK;
use crate::installer::ServiceOptions;
use crate::paths::resolve_path;
use crate::platform::OwnershipSpec;
use crate::retry::RetryPolicy;
use crate::updater::ArtifactNaming;

/// 配置根对象。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HangarConfig {
    /// 安装根目录。
    pub install_root: String,
    /// 工作目录（下载与解压）。
    pub work_folder: String,
    /// 交换目录（归档与配置文件的来源）。
    pub exchange_folder: String,
    /// 主机名（归档文件名前缀）。
    pub host_name: String,
    #[serde(default)]
    /// 服务器名（配置文件名前缀），为空时使用 `host_name`。
    pub server_name: Option<String>,
    #[serde(default = "default_runtime_identifier")]
    /// 运行时标识，例如 `linux-x64`。
    pub runtime_identifier: String,
    #[serde(default = "default_date_mask")]
    /// 文件名中的日期掩码（`time` crate 格式描述语法）。
    pub date_mask: String,
    #[serde(default = "default_archive_extension")]
    pub archive_extension: String,
    #[serde(default = "default_settings_extension")]
    pub settings_extension: String,
    #[serde(default)]
    /// 服务运行账户/文件所有者；为空则不修改所有权。
    pub service_user: Option<String>,
    #[serde(default)]
    pub service_group: Option<String>,
    #[serde(default)]
    /// 服务描述前缀。
    pub description_signature: Option<String>,
    #[serde(default)]
    /// 删除重试策略（默认 10 次 × 3 秒）。
    pub delete_retry: RetryPolicy,
    #[serde(default)]
    /// Linux（systemd）专用设置。
    pub linux: LinuxConfig,
}

/// Linux（systemd）专用设置。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinuxConfig {
    /// 单元文件目录。
    pub unit_dir: String,
    /// dotnet 运行器路径；为空时通过 `which dotnet` 查找。
    pub dotnet_runner: Option<String>,
    /// systemctl 程序。
    pub systemctl: String,
    /// chown 程序。
    pub chown: String,
}

impl Default for LinuxConfig {
    fn default() -> Self {
        Self {
            unit_dir: "/etc/systemd/system".to_string(),
            dotnet_runner: None,
            systemctl: "systemctl".to_string(),
            chown: "chown".to_string(),
        }
    }
}

/// 解析后的目录集合。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFolders {
    pub install_root: PathBuf,
    pub work_folder: PathBuf,
    pub exchange_folder: PathBuf,
}

fn default_runtime_identifier() -> String {
    if cfg!(windows) {
        "win-x64".to_string()
    } else {
        "linux-x64".to_string()
    }
}

fn default_date_mask() -> String {
    DEFAULT_DATE_MASK.to_string()
}

fn default_archive_extension() -> String {
    ".zip".to_string()
}

fn default_settings_extension() -> String {
    ".json".to_string()
}

impl HangarConfig {
    /// 读取并校验配置文件。
    ///
    /// 异常处理：
    /// - 文件不存在/JSON 无效/必填字段为空时返回错误
    pub fn load(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        let cfg: HangarConfig = serde_json::from_slice(&bytes)
            .with_context(|| format!("解析配置文件失败: {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("install_root", &self.install_root),
            ("work_folder", &self.work_folder),
            ("exchange_folder", &self.exchange_folder),
            ("host_name", &self.host_name),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("配置项 {field} 不能为空"));
            }
        }
        if self.delete_retry.attempts == 0 {
            return Err(anyhow!("配置项 delete_retry.attempts 至少为 1"));
        }
        Ok(())
    }

    /// 按 `base`（通常为配置文件所在目录）解析目录字段。
    pub fn resolve_folders(&self, base: &Path) -> Result<ResolvedFolders> {
        Ok(ResolvedFolders {
            install_root: resolve_path(base, &self.install_root)?,
            work_folder: resolve_path(base, &self.work_folder)?,
            exchange_folder: resolve_path(base, &self.exchange_folder)?,
        })
    }

    pub fn server_name(&self) -> &str {
        self.server_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.host_name)
    }

    pub fn naming(&self) -> ArtifactNaming {
        ArtifactNaming {
            host_name: self.host_name.clone(),
            server_name: self.server_name().to_string(),
            runtime_identifier: self.runtime_identifier.clone(),
            date_mask: self.date_mask.clone(),
            archive_extension: self.archive_extension.clone(),
            settings_extension: self.settings_extension.clone(),
        }
    }

    pub fn ownership(&self) -> OwnershipSpec {
        OwnershipSpec::new(self.service_user.clone(), self.service_group.clone())
    }

    /// 以服务方式部署时的注册参数（运行账户与文件所有者相同）。
    pub fn service_options(&self, project_description: Option<String>) -> ServiceOptions {
        ServiceOptions {
            run_as_user: self.service_user.clone(),
            description_signature: self.description_signature.clone(),
            project_description,
        }
    }
}
