//! 服务标识与安装目录布局。
//!
//! 约定：
//! - 服务名 `service_env_name` = 项目名 + 环境名（区分大小写的直接拼接，不做防冲突处理）
//! - 安装目录布局：`install_root/{project}/{environment}/`，主程序为 `{project}.{扩展名}`
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::{Path, PathBuf};

/// 当前平台主程序的扩展名（Windows 为可执行文件，其余平台为由 dotnet 运行器加载的程序集）。
pub const MAIN_BINARY_EXTENSION: &str = if cfg!(windows) { "exe" } else { "dll" };

/// 服务标识：`(project_name, environment_name)`。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceIdentity {
    project_name: String,
    environment_name: String,
}

impl ServiceIdentity {
    pub fn new(project_name: impl Into<String>, environment_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            environment_name: environment_name.into(),
        }
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn environment_name(&self) -> &str {
        &self.environment_name
    }

    /// 操作系统中注册的服务名。
    ///
    /// 返回值：
    /// - `project_name + environment_name`，例如 `("billing", "prod")` → `"billingprod"`
    pub fn service_env_name(&self) -> String {
        format!("{}{}", self.project_name, self.environment_name)
    }

    /// 主程序文件名（`{project}.{扩展名}`）。
    pub fn main_binary_file_name(&self) -> String {
        format!("{}.{}", self.project_name, MAIN_BINARY_EXTENSION)
    }
}

/// 安装目录布局。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationLayout {
    install_root: PathBuf,
}

impl InstallationLayout {
    pub fn new(install_root: impl Into<PathBuf>) -> Self {
        Self {
            install_root: install_root.into(),
        }
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    /// `install_root/{project}`
    pub fn project_install_path(&self, identity: &ServiceIdentity) -> PathBuf {
        self.install_root.join(identity.project_name())
    }

    /// `install_root/{project}/{environment}`，即在线部署目录。
    pub fn versioned_install_path(&self, identity: &ServiceIdentity) -> PathBuf {
        self.project_install_path(identity)
            .join(identity.environment_name())
    }

    /// 在线部署目录中的主程序路径。
    pub fn main_binary_path(&self, identity: &ServiceIdentity) -> PathBuf {
        self.versioned_install_path(identity)
            .join(identity.main_binary_file_name())
    }
}
