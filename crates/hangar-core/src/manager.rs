//! 对外调用入口：安装/更新配置/移除/启停。
//!
//! [`ProjectManagerFacade`] 在本地执行与远程执行之间选择；远程实现（例如 HTTP 代理客户端）
//! 由调用方提供，只需实现 [`ProjectManager`]。
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use crate::artifact::ArtifactStore;
use crate::error::DeployResult;
use crate::identity::ServiceIdentity;
use crate::installer::{Installer, SettingsUpdateOutcome};
use crate::platform::CapabilitySet;
use crate::updater::{
    AppParametersFileUpdater, ApplicationUpdater, ArtifactNaming, ParametersUpdateRequest,
    ProgramUpdateRequest,
};

/// 项目管理接口。
pub trait ProjectManager {
    /// 安装或更新程序，返回部署的版本。
    fn install_program(&self, request: &ProgramUpdateRequest) -> DeployResult<String>;

    /// 仅更新配置文件。
    fn update_app_parameters(
        &self,
        request: &ParametersUpdateRequest,
    ) -> DeployResult<SettingsUpdateOutcome>;

    fn remove_project(&self, identity: &ServiceIdentity, is_service: bool) -> DeployResult<()>;

    fn start_service(&self, identity: &ServiceIdentity) -> DeployResult<()>;

    fn stop_service(&self, identity: &ServiceIdentity) -> DeployResult<()>;

    /// 交换目录中最新的程序归档文件名（只读）。
    fn latest_program(&self, identity: &ServiceIdentity) -> DeployResult<String>;
}

/// 在本机执行的项目管理实现。
pub struct LocalProjectManager<C, S> {
    installer: Installer<C>,
    store: S,
    naming: ArtifactNaming,
}

impl<C: CapabilitySet, S: ArtifactStore> LocalProjectManager<C, S> {
    pub fn new(installer: Installer<C>, store: S, naming: ArtifactNaming) -> Self {
        Self {
            installer,
            store,
            naming,
        }
    }

    fn application_updater(&self) -> ApplicationUpdater<'_, C, S> {
        ApplicationUpdater::new(&self.installer, &self.store, &self.naming)
    }
}

impl<C: CapabilitySet, S: ArtifactStore> ProjectManager for LocalProjectManager<C, S> {
    fn install_program(&self, request: &ProgramUpdateRequest) -> DeployResult<String> {
        self.application_updater().update(request)
    }

    fn update_app_parameters(
        &self,
        request: &ParametersUpdateRequest,
    ) -> DeployResult<SettingsUpdateOutcome> {
        AppParametersFileUpdater::new(&self.installer, &self.store, &self.naming).update(request)
    }

    fn remove_project(&self, identity: &ServiceIdentity, is_service: bool) -> DeployResult<()> {
        self.installer.remove_project_and_service(identity, is_service)
    }

    fn start_service(&self, identity: &ServiceIdentity) -> DeployResult<()> {
        self.installer.start_service(identity)
    }

    fn stop_service(&self, identity: &ServiceIdentity) -> DeployResult<()> {
        self.installer.stop_service(identity)
    }

    fn latest_program(&self, identity: &ServiceIdentity) -> DeployResult<String> {
        self.application_updater().latest_archive(identity)
    }
}

/// 本地/远程执行选择。
pub enum ProjectManagerFacade<L, R> {
    Local(L),
    Remote(R),
}

impl<L: ProjectManager, R: ProjectManager> ProjectManagerFacade<L, R> {
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    fn target(&self) -> &dyn ProjectManager {
        match self {
            Self::Local(local) => local,
            Self::Remote(remote) => remote,
        }
    }
}

impl<L: ProjectManager, R: ProjectManager> ProjectManager for ProjectManagerFacade<L, R> {
    fn install_program(&self, request: &ProgramUpdateRequest) -> DeployResult<String> {
        self.target().install_program(request)
    }

    fn update_app_parameters(
        &self,
        request: &ParametersUpdateRequest,
    ) -> DeployResult<SettingsUpdateOutcome> {
        self.target().update_app_parameters(request)
    }

    fn remove_project(&self, identity: &ServiceIdentity, is_service: bool) -> DeployResult<()> {
        self.target().remove_project(identity, is_service)
    }

    fn start_service(&self, identity: &ServiceIdentity) -> DeployResult<()> {
        self.target().start_service(identity)
    }

    fn stop_service(&self, identity: &ServiceIdentity) -> DeployResult<()> {
        self.target().stop_service(identity)
    }

    fn latest_program(&self, identity: &ServiceIdentity) -> DeployResult<String> {
        self.target().latest_program(identity)
    }
}
