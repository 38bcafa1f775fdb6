//! 上层更新流程：从交换目录查找最新文件、按需下载，然后委托安装编排器。
//!
//! - [`ApplicationUpdater`]：程序归档（可附带配置文件）的完整更新
//! - [`AppParametersFileUpdater`]：仅更新已安装程序的配置文件
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::{Path, PathBuf};

use tracing::info;

use crate::artifact::{ArtifactStore, FileNamePattern};
use crate::error::{DeployError, DeployResult, WrapErr};
use crate::identity::ServiceIdentity;
use crate::installer::{DeploymentTarget, Installer, ServiceOptions, SettingsUpdateOutcome};
use crate::platform::CapabilitySet;
use crate::settings::SettingsPayload;

/// 交换目录文件命名参数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNaming {
    pub host_name: String,
    pub server_name: String,
    pub runtime_identifier: String,
    pub date_mask: String,
    pub archive_extension: String,
    pub settings_extension: String,
}

impl ArtifactNaming {
    pub fn archive_pattern(&self, identity: &ServiceIdentity) -> FileNamePattern {
        FileNamePattern::program_archive(
            &self.host_name,
            identity.environment_name(),
            identity.project_name(),
            &self.runtime_identifier,
            &self.date_mask,
            &self.archive_extension,
        )
    }

    pub fn settings_pattern(&self, identity: &ServiceIdentity) -> FileNamePattern {
        FileNamePattern::settings_file(
            &self.server_name,
            identity.environment_name(),
            identity.project_name(),
            &self.date_mask,
            &self.settings_extension,
        )
    }
}

/// 程序更新请求。
#[derive(Debug, Clone)]
pub struct ProgramUpdateRequest {
    pub target: DeploymentTarget,
    /// `Some` 表示以服务方式部署。
    pub service: Option<ServiceOptions>,
    /// 安装目录中的配置文件名（例如 `appsettings.json`）；服务部署且为 `Some` 时同时下发最新配置文件。
    pub app_settings_file_name: Option<String>,
}

/// 配置文件更新请求。
#[derive(Debug, Clone)]
pub struct ParametersUpdateRequest {
    pub target: DeploymentTarget,
    pub is_service: bool,
    /// 安装目录中的配置文件名。
    pub app_settings_file_name: String,
}

/// 程序归档更新流程。
pub struct ApplicationUpdater<'a, C, S> {
    installer: &'a Installer<C>,
    store: &'a S,
    naming: &'a ArtifactNaming,
}

impl<'a, C: CapabilitySet, S: ArtifactStore> ApplicationUpdater<'a, C, S> {
    pub fn new(installer: &'a Installer<C>, store: &'a S, naming: &'a ArtifactNaming) -> Self {
        Self {
            installer,
            store,
            naming,
        }
    }

    /// 交换目录中最新的程序归档文件名。
    pub fn latest_archive(&self, identity: &ServiceIdentity) -> DeployResult<String> {
        self.installer.observe("latest_archive", identity, || {
            find_latest(self.store, &self.naming.archive_pattern(identity))
        })
    }

    /// 执行更新，返回部署的程序版本。
    ///
    /// 主要步骤：
    /// 1) 查找最新归档；工作目录中已存在同名文件时不重复下载
    /// 2) 非服务程序直接走普通更新流程（不下发配置文件）
    /// 3) 服务程序需要时查找并读取最新配置文件，然后走服务更新流程
    pub fn update(&self, request: &ProgramUpdateRequest) -> DeployResult<String> {
        let identity = &request.target.identity;
        let (archive, settings) = self.installer.observe("fetch_program", identity, || {
            let work = &self.installer.settings().work_folder;
            self.installer.ensure_not_self(identity)?;

            let archive = find_latest(self.store, &self.naming.archive_pattern(identity))?;
            info!(%archive, "找到最新程序归档");
            fetch(self.store, &archive, work)?;

            let settings = match (&request.service, &request.app_settings_file_name) {
                (Some(_), Some(name)) => {
                    Some(load_latest_settings(self.store, self.naming, identity, work, name)?)
                }
                _ => None,
            };
            Ok((archive, settings))
        })?;

        match &request.service {
            Some(options) => self.installer.run_update_service(
                &request.target,
                options,
                &archive,
                settings.as_ref(),
            ),
            None => self.installer.run_update_application(&request.target, &archive),
        }
    }
}

/// 配置文件更新流程。
pub struct AppParametersFileUpdater<'a, C, S> {
    installer: &'a Installer<C>,
    store: &'a S,
    naming: &'a ArtifactNaming,
}

impl<'a, C: CapabilitySet, S: ArtifactStore> AppParametersFileUpdater<'a, C, S> {
    pub fn new(installer: &'a Installer<C>, store: &'a S, naming: &'a ArtifactNaming) -> Self {
        Self {
            installer,
            store,
            naming,
        }
    }

    pub fn update(&self, request: &ParametersUpdateRequest) -> DeployResult<SettingsUpdateOutcome> {
        let identity = &request.target.identity;
        let settings = self.installer.observe("fetch_settings", identity, || {
            self.installer.ensure_not_self(identity)?;
            load_latest_settings(
                self.store,
                self.naming,
                identity,
                &self.installer.settings().work_folder,
                &request.app_settings_file_name,
            )
        })?;
        self.installer
            .run_update_settings(&request.target, request.is_service, &settings)
    }
}

fn find_latest(store: &impl ArtifactStore, pattern: &FileNamePattern) -> DeployResult<String> {
    let names = store
        .list_files()
        .wrap_err(|| DeployError::StoreUnavailable)?;
    pattern
        .latest(&names)
        .map(str::to_string)
        .ok_or_else(|| {
            DeployError::ArtifactNotFound {
                pattern: pattern.describe(),
            }
            .into()
        })
}

/// 将文件下载到工作目录；已存在则直接使用本地文件。
fn fetch(store: &impl ArtifactStore, file_name: &str, work: &Path) -> DeployResult<PathBuf> {
    std::fs::create_dir_all(work)
        .map_err(|e| DeployError::io("创建工作目录", work, e))
        .wrap_err(|| DeployError::WorkFolderUnavailable(work.to_path_buf()))?;

    let local = work.join(file_name);
    if local.is_file() {
        info!(path = %local.display(), "工作目录中已存在，跳过下载");
        return Ok(local);
    }
    info!(%file_name, "从交换目录下载");
    store
        .download(file_name, work)
        .wrap_err(|| DeployError::DownloadFailed {
            file_name: file_name.to_string(),
        })
}

fn load_latest_settings(
    store: &impl ArtifactStore,
    naming: &ArtifactNaming,
    identity: &ServiceIdentity,
    work: &Path,
    install_file_name: &str,
) -> DeployResult<SettingsPayload> {
    let latest = find_latest(store, &naming.settings_pattern(identity))?;
    info!(settings = %latest, "找到最新配置文件");
    let local = fetch(store, &latest, work)?;
    let content = std::fs::read_to_string(&local)
        .map_err(|e| DeployError::io("读取配置文件", &local, e))?;
    Ok(SettingsPayload::new(install_file_name, content))
}
