//! 平台能力接口（服务探测 / 服务注册 / 所有权管理）。
//!
//! 每个操作系统实现一次（Windows：服务控制管理器 + 注册表 + ACL；Linux：systemd 单元文件 +
//! `systemctl` + `chown`），启动时按操作系统选择，测试中可注入伪造实现。
//!
//! 约定：
//! - 探测类接口不产生副作用，服务不存在时返回 `false` 而不是错误
//! - 其余接口返回 `anyhow::Result`，由编排器转换为 [`crate::error::DeployError`]
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use crate::identity::{InstallationLayout, ServiceIdentity};

/// 服务存在性/运行状态探测。
pub trait ServiceHostProbe {
    /// 服务是否已注册。
    fn exists(&self, service_env_name: &str) -> bool;

    /// 服务是否处于运行状态（Windows：状态不为 Stopped/StopPending；Linux：`is-active`）。
    fn is_running(&self, service_env_name: &str) -> bool;

    /// 是否存在引用该主程序的进程（无论是否以服务方式启动）。
    fn is_process_running(&self, main_binary: &Path) -> bool;
}

/// 服务注册信息的创建/校验/移除与启停。
pub trait ServiceRegistrar {
    /// 比较期望注册信息与实际注册信息；返回 `false` 时调用方应移除后重新注册。
    fn is_registered_properly(&self, descriptor: &ServiceRegistrationDescriptor) -> Result<bool>;

    /// 注册服务（开机自动启动），完成后校验服务存在。
    fn register(&self, descriptor: &ServiceRegistrationDescriptor) -> Result<()>;

    /// 移除服务注册。
    fn remove(&self, service_env_name: &str) -> Result<()>;

    /// 停止服务；已停止时为空操作。
    fn stop(&self, service_env_name: &str) -> Result<()>;

    /// 启动服务；已运行时为空操作。
    fn start(&self, service_env_name: &str) -> Result<()>;
}

/// 文件/目录所有权管理。
pub trait OwnershipManager {
    fn change_file_owner(&self, path: &Path, spec: &OwnershipSpec) -> Result<()>;

    fn change_folder_owner_recursive(&self, path: &Path, spec: &OwnershipSpec) -> Result<()>;
}

/// 一个平台的完整能力集合。
pub trait CapabilitySet {
    type Probe: ServiceHostProbe;
    type Registrar: ServiceRegistrar;
    type Ownership: OwnershipManager;

    fn probe(&self) -> &Self::Probe;
    fn registrar(&self) -> &Self::Registrar;
    fn ownership(&self) -> &Self::Ownership;
}

/// 所有权设置：用户名 + 可选组名。
///
/// 用户名为空表示不修改所有权。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnershipSpec {
    pub user: Option<String>,
    pub group: Option<String>,
}

impl OwnershipSpec {
    pub fn new(user: Option<String>, group: Option<String>) -> Self {
        Self { user, group }
    }

    /// 非空用户名。
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    /// 非空组名。
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref().map(str::trim).filter(|g| !g.is_empty())
    }
}

/// 所有权修改前的公共检查。
///
/// 返回值：
/// - `Ok(None)`：未指定用户，调用方直接返回成功
/// - `Ok(Some(user))`：需要修改所有权
///
/// 异常处理：
/// - 目标路径不存在时返回错误
pub fn ownership_target<'a>(path: &Path, spec: &'a OwnershipSpec) -> Result<Option<&'a str>> {
    let Some(user) = spec.user() else {
        return Ok(None);
    };
    if !path.exists() {
        return Err(anyhow!("修改所有权的目标不存在: {}", path.display()));
    }
    Ok(Some(user))
}

/// 服务注册描述：与实际注册信息逐字段比较以决定是否需要重新注册。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRegistrationDescriptor {
    pub service_env_name: String,
    pub project_name: String,
    /// 主程序路径（Windows 为服务可执行文件；Linux 为交给 dotnet 运行器的程序集）。
    pub binary_path: PathBuf,
    /// 工作目录（在线部署目录）。
    pub working_directory: PathBuf,
    pub description: String,
    pub run_as_user: Option<String>,
}

impl ServiceRegistrationDescriptor {
    /// 按安装布局构造期望的注册信息。
    ///
    /// 参数：
    /// - `description_signature`：调用方签名（例如部署工具名称），位于描述开头
    /// - `project_description`：项目描述
    pub fn new(
        identity: &ServiceIdentity,
        layout: &InstallationLayout,
        run_as_user: Option<&str>,
        description_signature: Option<&str>,
        project_description: Option<&str>,
    ) -> Self {
        Self {
            service_env_name: identity.service_env_name(),
            project_name: identity.project_name().to_string(),
            binary_path: layout.main_binary_path(identity),
            working_directory: layout.versioned_install_path(identity),
            description: compose_description(description_signature, project_description),
            run_as_user: run_as_user
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string),
        }
    }
}

/// 组合服务描述：签名与项目描述之间以空格连接，忽略空值。
pub fn compose_description(signature: Option<&str>, project_description: Option<&str>) -> String {
    [signature, project_description]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_skips_missing_parts() {
        assert_eq!(compose_description(Some("[hangar]"), Some("Billing API")), "[hangar] Billing API");
        assert_eq!(compose_description(None, Some("Billing API")), "Billing API");
        assert_eq!(compose_description(Some(" "), None), "");
    }

    #[test]
    fn empty_user_means_no_ownership_change() {
        let spec = OwnershipSpec::new(Some("  ".to_string()), Some("svc".to_string()));
        let target = ownership_target(Path::new("/definitely/not/here"), &spec).unwrap();
        assert!(target.is_none());
    }

    #[test]
    fn missing_path_is_an_error_when_user_given() {
        let spec = OwnershipSpec::new(Some("svc".to_string()), None);
        assert!(ownership_target(Path::new("/definitely/not/here"), &spec).is_err());
    }

    #[test]
    fn descriptor_points_into_versioned_install_path() {
        let layout = InstallationLayout::new("/opt/apps");
        let id = ServiceIdentity::new("app1", "staging");
        let d = ServiceRegistrationDescriptor::new(&id, &layout, Some("svc"), Some("[hangar]"), None);
        assert_eq!(d.service_env_name, "app1staging");
        assert_eq!(d.working_directory, PathBuf::from("/opt/apps/app1/staging"));
        assert!(d.binary_path.starts_with("/opt/apps/app1/staging"));
        assert_eq!(d.description, "[hangar]");
        assert_eq!(d.run_as_user.as_deref(), Some("svc"));
    }
}
