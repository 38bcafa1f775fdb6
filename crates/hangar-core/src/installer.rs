//! 安装编排器：停止 → 解压 → 替换 → 授权 → 注册/校验 → 启动。
//!
//! 每个步骤返回成功或有序错误列表，第一个失败的步骤即终止整个流程（不做部分续跑）；
//! 唯一的重试是删除在线部署目录/配置文件时的有限重试（默认 10 次 × 3 秒）。
//!
//! 平台相关操作全部委托给 [`CapabilitySet`]。
//!
//! 并发约定：
//! - 同一 `(project, environment)` 的两个更新请求没有互斥保护，由调用方串行化
//! - 不同服务的更新互不相关，可以并行
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::io;
use std::path::{Path, PathBuf};

use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use crate::archive::{read_program_version, ArchiveDescriptor, ArchiveExtractor, ZipExtractor};
use crate::cancel::CancellationFlag;
use crate::error::{DeployError, DeployResult, ErrorChain, WrapErr};
use crate::identity::{InstallationLayout, ServiceIdentity};
use crate::paths;
use crate::platform::{
    CapabilitySet, OwnershipManager, OwnershipSpec, ServiceHostProbe, ServiceRegistrar,
    ServiceRegistrationDescriptor,
};
use crate::progress::{NoProgress, ProgressSink};
use crate::retry::{retry_fixed, RetryError, RetryPolicy};
use crate::settings::{read_version_token, SettingsPayload};

/// 编排器配置。
#[derive(Debug, Clone)]
pub struct InstallerSettings {
    /// 安装根目录。
    pub install_root: PathBuf,
    /// 工作目录（下载与解压的临时位置）。
    pub work_folder: PathBuf,
    /// 当前部署程序自身的名称，用于“禁止更新自身”检查。
    pub own_program_name: String,
    /// 删除重试策略。
    pub delete_retry: RetryPolicy,
}

/// 部署目标：服务标识 + 所有权设置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentTarget {
    pub identity: ServiceIdentity,
    pub ownership: OwnershipSpec,
}

impl DeploymentTarget {
    pub fn new(identity: ServiceIdentity, ownership: OwnershipSpec) -> Self {
        Self { identity, ownership }
    }
}

/// 以服务方式部署时的注册参数。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceOptions {
    pub run_as_user: Option<String>,
    pub description_signature: Option<String>,
    pub project_description: Option<String>,
}

/// 仅更新配置文件的结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsUpdateOutcome {
    /// 已写入新配置（服务已重启）。
    Updated,
    /// 已安装配置的版本标记与新配置一致，未做任何修改。
    AlreadyCurrent { version: String },
}

/// 安装编排器。
pub struct Installer<C> {
    settings: InstallerSettings,
    layout: InstallationLayout,
    capabilities: C,
    extractor: Box<dyn ArchiveExtractor + Send + Sync>,
    progress: Box<dyn ProgressSink>,
    cancel: CancellationFlag,
}

impl<C: CapabilitySet> Installer<C> {
    pub fn new(settings: InstallerSettings, capabilities: C) -> Self {
        let layout = InstallationLayout::new(settings.install_root.clone());
        Self {
            settings,
            layout,
            capabilities,
            extractor: Box::new(ZipExtractor),
            progress: Box::new(NoProgress),
            cancel: CancellationFlag::new(),
        }
    }

    pub fn with_extractor(mut self, extractor: impl ArchiveExtractor + Send + Sync + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn with_progress(mut self, progress: impl ProgressSink + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn settings(&self) -> &InstallerSettings {
        &self.settings
    }

    pub fn layout(&self) -> &InstallationLayout {
        &self.layout
    }

    /// 更新非服务程序（不涉及服务注册）。
    ///
    /// 主要步骤：
    /// 1) 确保工作目录存在；清理上次失败残留的解压目录
    /// 2) 解压归档并读取主程序版本；删除归档文件
    /// 3) 删除旧的在线部署目录（有限重试），将解压目录移动到位
    /// 4) 修改所有权
    ///
    /// 返回值：
    /// - 新部署程序的版本号
    pub fn run_update_application(
        &self,
        target: &DeploymentTarget,
        archive_file_name: &str,
    ) -> DeployResult<String> {
        self.observe("update_application", &target.identity, || {
            self.ensure_not_self(&target.identity)?;
            let (archive, version) = self.prepare_archive(&target.identity, archive_file_name)?;
            let install_path = self.swap_into_place(&target.identity, archive.extraction_folder())?;
            self.apply_folder_ownership(&install_path, &target.ownership)?;
            Ok(version)
        })
    }

    /// 更新以服务方式运行的程序。
    ///
    /// 主要步骤：
    /// 1) 解压归档并读取版本
    /// 2) 探测服务是否已注册/正在运行；运行中则先停止（停止失败即终止）
    /// 3) 仍检测到引用主程序的进程时终止，避免破坏在线部署
    /// 4) 删除旧部署目录（有限重试）、移动到位、写入配置文件、修改所有权
    /// 5) 已注册则校验注册信息，不正确时移除；未注册（或刚被移除）时重新注册
    /// 6) 启动服务
    ///
    /// 返回值：
    /// - 新部署程序的版本号
    pub fn run_update_service(
        &self,
        target: &DeploymentTarget,
        service: &ServiceOptions,
        archive_file_name: &str,
        settings: Option<&SettingsPayload>,
    ) -> DeployResult<String> {
        self.observe("update_service", &target.identity, || {
            let identity = &target.identity;
            self.ensure_not_self(identity)?;
            let (archive, version) = self.prepare_archive(identity, archive_file_name)?;

            let name = identity.service_env_name();
            let mut registered = self.probe().exists(&name);
            if registered && self.probe().is_running(&name) {
                info!(service = %name, "停止服务");
                self.registrar()
                    .stop(&name)
                    .wrap_err(|| DeployError::ServiceStopFailed(name.clone()))?;
            }
            self.guard_no_live_process(identity)?;

            let install_path = self.swap_into_place(identity, archive.extraction_folder())?;
            if let Some(settings) = settings {
                self.write_settings_file(&install_path.join(settings.file_name()), settings)?;
            }
            self.apply_folder_ownership(&install_path, &target.ownership)?;

            let descriptor = ServiceRegistrationDescriptor::new(
                identity,
                &self.layout,
                service.run_as_user.as_deref(),
                service.description_signature.as_deref(),
                service.project_description.as_deref(),
            );
            if registered {
                let proper = self
                    .registrar()
                    .is_registered_properly(&descriptor)
                    .wrap_err(|| DeployError::RegistrationCheckFailed(name.clone()))?;
                if !proper {
                    warn!(service = %name, "服务注册信息与期望不一致，移除后重新注册");
                    self.registrar()
                        .remove(&name)
                        .wrap_err(|| DeployError::RegistrationMismatch(name.clone()))?;
                    registered = false;
                }
            }
            if !registered {
                self.cancel.check("register")?;
                info!(service = %name, "注册服务");
                self.registrar()
                    .register(&descriptor)
                    .wrap_err(|| DeployError::RegistrationFailed(name.clone()))?;
            }

            self.cancel.check("start")?;
            info!(service = %name, "启动服务");
            self.registrar()
                .start(&name)
                .wrap_err(|| DeployError::ServiceStartFailed(name.clone()))?;
            Ok(version)
        })
    }

    /// 仅更新已安装程序的配置文件。
    ///
    /// 幂等：若已安装配置与新配置的 `VersionInfo.AppSettingsVersion` 相同，不做任何修改
    /// （不停止也不启动服务），返回 [`SettingsUpdateOutcome::AlreadyCurrent`]。
    ///
    /// 异常处理：
    /// - 以服务方式更新但服务尚未注册：返回前置条件错误
    /// - 配置已写入但服务无法重新启动：返回 [`DeployError::SettingsAppliedServiceDown`]
    pub fn run_update_settings(
        &self,
        target: &DeploymentTarget,
        is_service: bool,
        settings: &SettingsPayload,
    ) -> DeployResult<SettingsUpdateOutcome> {
        self.observe("update_settings", &target.identity, || {
            let identity = &target.identity;
            self.ensure_not_self(identity)?;

            let root = self.layout.install_root();
            if !root.is_dir() {
                return Err(DeployError::InstallRootMissing(root.to_path_buf()).into());
            }
            let install_path = self.layout.versioned_install_path(identity);
            if !install_path.is_dir() {
                return Err(DeployError::ProjectFolderMissing(install_path).into());
            }

            let settings_path = install_path.join(settings.file_name());
            if let Some(incoming) = settings.version_token() {
                if settings_path.is_file() {
                    let current = std::fs::read_to_string(&settings_path)
                        .map_err(|e| DeployError::io("读取已安装配置文件", &settings_path, e))?;
                    if read_version_token(&current).as_deref() == Some(incoming.as_str()) {
                        warn!(version = %incoming, path = %settings_path.display(), "配置文件版本未变化，跳过更新");
                        self.progress
                            .message(&format!("配置文件已是版本 {incoming}，无需更新"));
                        return Ok(SettingsUpdateOutcome::AlreadyCurrent { version: incoming });
                    }
                }
            }

            let name = identity.service_env_name();
            if is_service {
                if !self.probe().exists(&name) {
                    return Err(DeployError::ServiceNotRegistered(name).into());
                }
                info!(service = %name, "停止服务");
                self.registrar()
                    .stop(&name)
                    .wrap_err(|| DeployError::ServiceStopFailed(name.clone()))?;
            }
            self.guard_no_live_process(identity)?;

            self.cancel.check("delete")?;
            self.delete_with_retry(&settings_path, false)?;
            self.write_settings_file(&settings_path, settings)?;
            self.capabilities
                .ownership()
                .change_file_owner(&settings_path, &target.ownership)
                .wrap_err(|| DeployError::OwnershipFailed(settings_path.clone()))?;

            if is_service {
                self.cancel.check("start")?;
                info!(service = %name, "重新启动服务");
                self.registrar()
                    .start(&name)
                    .wrap_err(|| DeployError::SettingsAppliedServiceDown(name.clone()))?;
            }
            Ok(SettingsUpdateOutcome::Updated)
        })
    }

    /// 移除项目：服务方式时先停止并移除注册，然后删除在线部署目录。
    ///
    /// 服务不存在、目录已删除均视为成功。
    pub fn remove_project_and_service(
        &self,
        identity: &ServiceIdentity,
        is_service: bool,
    ) -> DeployResult<()> {
        self.observe("remove", identity, || {
            let name = identity.service_env_name();
            if is_service && self.probe().exists(&name) {
                if self.probe().is_running(&name) {
                    info!(service = %name, "停止服务");
                    self.registrar()
                        .stop(&name)
                        .wrap_err(|| DeployError::ServiceStopFailed(name.clone()))?;
                }
                info!(service = %name, "移除服务注册");
                self.registrar()
                    .remove(&name)
                    .wrap_err(|| DeployError::RemovalFailed(name.clone()))?;
            }

            self.cancel.check("delete")?;
            let install_path = self.layout.versioned_install_path(identity);
            self.delete_with_retry(&install_path, true)?;

            let project_path = self.layout.project_install_path(identity);
            if project_path.exists() && paths::is_dir_empty(&project_path)? {
                match std::fs::remove_dir(&project_path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(DeployError::io("删除项目目录", &project_path, e).into()),
                }
            }
            Ok(())
        })
    }

    /// 停止服务（已停止时为空操作）。
    pub fn stop_service(&self, identity: &ServiceIdentity) -> DeployResult<()> {
        self.observe("stop", identity, || {
            let name = identity.service_env_name();
            self.registrar()
                .stop(&name)
                .wrap_err(|| DeployError::ServiceStopFailed(name.clone()))
        })
    }

    /// 启动服务（已运行时为空操作）。
    pub fn start_service(&self, identity: &ServiceIdentity) -> DeployResult<()> {
        self.observe("start", identity, || {
            let name = identity.service_env_name();
            self.registrar()
                .start(&name)
                .wrap_err(|| DeployError::ServiceStartFailed(name.clone()))
        })
    }

    fn probe(&self) -> &C::Probe {
        self.capabilities.probe()
    }

    fn registrar(&self) -> &C::Registrar {
        self.capabilities.registrar()
    }

    /// 统一的日志与进度转发：失败时逐条记录错误并推送给进度接收方。
    ///
    /// 每个失败只应经过一次 `observe`，调用方不要嵌套使用。
    pub(crate) fn observe<T>(
        &self,
        operation: &'static str,
        identity: &ServiceIdentity,
        f: impl FnOnce() -> DeployResult<T>,
    ) -> DeployResult<T> {
        let run_id = Uuid::new_v4();
        let span = info_span!("deploy", %run_id, operation, service = %identity.service_env_name());
        let _entered = span.enter();

        info!("开始执行");
        match f() {
            Ok(v) => {
                info!("执行完成");
                Ok(v)
            }
            Err(chain) => {
                for e in chain.errors() {
                    error!(kind = ?e.kind(), "{e}");
                }
                self.progress.error(&chain.to_string());
                Err(chain)
            }
        }
    }

    /// “禁止更新自身”检查：项目名等于当前部署程序名称时拒绝。
    pub fn ensure_not_self(&self, identity: &ServiceIdentity) -> DeployResult<()> {
        if identity.project_name() == self.settings.own_program_name {
            return Err(DeployError::CannotUpdateSelf(identity.project_name().to_string()).into());
        }
        Ok(())
    }

    fn guard_no_live_process(&self, identity: &ServiceIdentity) -> DeployResult<()> {
        let main_binary = self.layout.main_binary_path(identity);
        if self.probe().is_process_running(&main_binary) {
            return Err(DeployError::ProcessStillRunning(identity.service_env_name()).into());
        }
        Ok(())
    }

    /// 解压归档并读取版本；成功后删除归档文件。
    fn prepare_archive(
        &self,
        identity: &ServiceIdentity,
        archive_file_name: &str,
    ) -> DeployResult<(ArchiveDescriptor, String)> {
        let work = &self.settings.work_folder;
        std::fs::create_dir_all(work)
            .map_err(|e| DeployError::io("创建工作目录", work, e))
            .wrap_err(|| DeployError::WorkFolderUnavailable(work.clone()))?;

        let archive = ArchiveDescriptor::new(work, archive_file_name);
        if !archive.archive_path().is_file() {
            return Err(DeployError::ArtifactNotFound {
                pattern: archive.archive_path().display().to_string(),
            }
            .into());
        }

        self.cancel.check("extract")?;
        let extraction = archive.extraction_folder();
        if extraction.exists() {
            info!(path = %extraction.display(), "清理上次残留的解压目录");
            std::fs::remove_dir_all(extraction)
                .map_err(|e| DeployError::io("删除残留解压目录", extraction, e))?;
        }

        info!(archive = %archive.archive_path().display(), "解压归档");
        self.extractor
            .extract(archive.archive_path(), extraction)
            .wrap_err(|| DeployError::ExtractionFailed(archive.archive_path().to_path_buf()))?;
        if !extraction.is_dir() {
            return Err(DeployError::ExtractionFolderMissing(extraction.to_path_buf()).into());
        }

        let main_binary = extraction.join(identity.main_binary_file_name());
        let version = read_program_version(&main_binary)
            .wrap_err(|| DeployError::VersionUnavailable(main_binary.clone()))?;
        info!(%version, "读取到程序版本");

        std::fs::remove_file(archive.archive_path())
            .map_err(|e| DeployError::io("删除归档文件", archive.archive_path(), e))?;
        Ok((archive, version))
    }

    /// 删除旧的在线部署目录并将解压目录移动到位，返回在线部署目录。
    fn swap_into_place(&self, identity: &ServiceIdentity, extraction: &Path) -> DeployResult<PathBuf> {
        let project_path = self.layout.project_install_path(identity);
        std::fs::create_dir_all(&project_path)
            .map_err(|e| DeployError::io("创建项目目录", &project_path, e))?;

        self.cancel.check("delete")?;
        let install_path = self.layout.versioned_install_path(identity);
        self.delete_with_retry(&install_path, true)?;

        info!(from = %extraction.display(), to = %install_path.display(), "移动部署目录");
        std::fs::rename(extraction, &install_path)
            .map_err(|e| DeployError::io("移动部署目录", &install_path, e))?;
        Ok(install_path)
    }

    fn apply_folder_ownership(&self, path: &Path, spec: &OwnershipSpec) -> DeployResult<()> {
        self.capabilities
            .ownership()
            .change_folder_owner_recursive(path, spec)
            .wrap_err(|| DeployError::OwnershipFailed(path.to_path_buf()))
    }

    fn write_settings_file(&self, path: &Path, settings: &SettingsPayload) -> DeployResult<()> {
        info!(path = %path.display(), "写入配置文件");
        std::fs::write(path, settings.content())
            .map_err(|e| DeployError::io("写入配置文件", path, e).into())
    }

    /// 按删除重试预算删除目录或文件；目标不存在视为成功。
    fn delete_with_retry(&self, path: &Path, is_dir: bool) -> DeployResult<()> {
        if !path.exists() {
            return Ok(());
        }
        let result = retry_fixed(
            self.settings.delete_retry,
            &self.cancel,
            |attempt| {
                let r = if is_dir {
                    std::fs::remove_dir_all(path)
                } else {
                    std::fs::remove_file(path)
                };
                match r {
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                    Err(e) => {
                        warn!(attempt, path = %path.display(), "删除失败: {e}");
                        Err(e)
                    }
                    Ok(()) => Ok(()),
                }
            },
            is_transient_delete_error,
        );
        result.map_err(|e| match e {
            RetryError::Exhausted { attempts, last } => ErrorChain::from(DeployError::io("删除", path, last))
                .with(DeployError::DeleteFailed {
                    path: path.to_path_buf(),
                    attempts,
                }),
            RetryError::Fatal { attempt, error } => ErrorChain::from(DeployError::io("删除", path, error))
                .with(DeployError::DeleteFailed {
                    path: path.to_path_buf(),
                    attempts: attempt,
                }),
            RetryError::Cancelled => DeployError::Cancelled("delete").into(),
        })
    }
}

/// 文件被占用/权限暂不可用属于可重试错误；参数非法等错误重试无意义。
fn is_transient_delete_error(e: &io::Error) -> bool {
    !matches!(
        e.kind(),
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData | io::ErrorKind::Unsupported
    )
}
