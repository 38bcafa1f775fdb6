//! 部署错误分类与有序错误列表。
//!
//! 约定：
//! - 每个公开操作返回 [`DeployResult`]：成功值，或非空的有序错误列表 [`ErrorChain`]
//! - 列表顺序为“最内层原因在前，外层上下文在后”，例如 `[systemctl 输出, 服务启动失败]`
//! - 平台层使用 `anyhow::Result`，进入编排器时统一转换为 [`DeployError::Platform`]
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// 错误大类。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 前置条件不满足（目录缺失、文件缺失、禁止更新自身等）。
    Precondition,
    /// 安全性错误（进程仍在运行、服务无法停止/启动、注册信息无法修复）。
    Safety,
    /// 操作系统操作失败（删除、授权、注册、卸载、单元文件读写）。
    Os,
    /// 解压/完整性错误。
    Integrity,
    /// 调用方取消。
    Cancelled,
}

/// 部署错误。
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("安装根目录不存在: {}", .0.display())]
    InstallRootMissing(PathBuf),
    #[error("项目安装目录不存在: {}", .0.display())]
    ProjectFolderMissing(PathBuf),
    #[error("交换目录中未找到匹配的文件: {pattern}")]
    ArtifactNotFound { pattern: String },
    #[error("不能更新正在运行的部署程序自身: {0}")]
    CannotUpdateSelf(String),
    #[error("服务尚未注册，仅更新配置前必须先完成完整安装: {0}")]
    ServiceNotRegistered(String),

    #[error("检测到进程仍在运行，拒绝继续: {0}")]
    ProcessStillRunning(String),
    #[error("服务停止失败: {0}")]
    ServiceStopFailed(String),
    #[error("服务启动失败: {0}")]
    ServiceStartFailed(String),
    #[error("配置文件已写入，但服务未能重新启动: {0}")]
    SettingsAppliedServiceDown(String),
    #[error("服务注册信息不正确且无法移除: {0}")]
    RegistrationMismatch(String),

    #[error("工作目录不可用: {}", .0.display())]
    WorkFolderUnavailable(PathBuf),
    #[error("删除失败（已尝试 {attempts} 次）: {}", .path.display())]
    DeleteFailed { path: PathBuf, attempts: u32 },
    #[error("{action}失败: {}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("修改所有权失败: {}", .0.display())]
    OwnershipFailed(PathBuf),
    #[error("服务注册失败: {0}")]
    RegistrationFailed(String),
    #[error("服务注册校验失败: {0}")]
    RegistrationCheckFailed(String),
    #[error("服务卸载失败: {0}")]
    RemovalFailed(String),
    #[error("从交换目录获取文件失败: {file_name}")]
    DownloadFailed { file_name: String },
    #[error("读取交换目录失败")]
    StoreUnavailable,
    #[error("{0}")]
    Platform(String),

    #[error("归档解压失败: {}", .0.display())]
    ExtractionFailed(PathBuf),
    #[error("解压后未生成预期目录: {}", .0.display())]
    ExtractionFolderMissing(PathBuf),
    #[error("无法读取程序版本: {}", .0.display())]
    VersionUnavailable(PathBuf),

    #[error("操作已取消（步骤：{0}）")]
    Cancelled(&'static str),
}

impl DeployError {
    /// 返回错误所属大类。
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InstallRootMissing(_)
            | Self::ProjectFolderMissing(_)
            | Self::ArtifactNotFound { .. }
            | Self::CannotUpdateSelf(_)
            | Self::ServiceNotRegistered(_) => ErrorKind::Precondition,
            Self::ProcessStillRunning(_)
            | Self::ServiceStopFailed(_)
            | Self::ServiceStartFailed(_)
            | Self::SettingsAppliedServiceDown(_)
            | Self::RegistrationMismatch(_) => ErrorKind::Safety,
            Self::WorkFolderUnavailable(_)
            | Self::DeleteFailed { .. }
            | Self::Io { .. }
            | Self::OwnershipFailed(_)
            | Self::RegistrationFailed(_)
            | Self::RegistrationCheckFailed(_)
            | Self::RemovalFailed(_)
            | Self::DownloadFailed { .. }
            | Self::StoreUnavailable
            | Self::Platform(_) => ErrorKind::Os,
            Self::ExtractionFailed(_) | Self::ExtractionFolderMissing(_) | Self::VersionUnavailable(_) => {
                ErrorKind::Integrity
            }
            Self::Cancelled(_) => ErrorKind::Cancelled,
        }
    }

    /// 构造 IO 错误。
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

/// 非空的有序错误列表。
///
/// 第一个元素是最内层原因，最后一个元素是最外层（面向调用方）的错误。
#[derive(Debug)]
pub struct ErrorChain(Vec<DeployError>);

impl ErrorChain {
    /// 全部错误（由内到外）。
    pub fn errors(&self) -> &[DeployError] {
        &self.0
    }

    /// 最外层错误。
    pub fn outermost(&self) -> &DeployError {
        // 构造途径只有 From<DeployError>/From<anyhow::Error>，列表不会为空
        &self.0[self.0.len() - 1]
    }

    /// 追加外层上下文。
    pub fn with(mut self, outer: DeployError) -> Self {
        self.0.push(outer);
        self
    }

    /// 是否包含指定大类的错误。
    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        self.0.iter().any(|e| e.kind() == kind)
    }
}

impl From<DeployError> for ErrorChain {
    fn from(err: DeployError) -> Self {
        Self(vec![err])
    }
}

impl From<anyhow::Error> for ErrorChain {
    fn from(err: anyhow::Error) -> Self {
        Self(vec![DeployError::Platform(format!("{err:#}"))])
    }
}

impl fmt::Display for ErrorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().rev().enumerate() {
            if i > 0 {
                f.write_str(" <- ")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorChain {}

/// 部署操作返回值。
pub type DeployResult<T> = Result<T, ErrorChain>;

/// 为错误追加外层上下文。
pub trait WrapErr<T> {
    fn wrap_err(self, outer: impl FnOnce() -> DeployError) -> DeployResult<T>;
}

impl<T, E: Into<ErrorChain>> WrapErr<T> for Result<T, E> {
    fn wrap_err(self, outer: impl FnOnce() -> DeployError) -> DeployResult<T> {
        self.map_err(|e| e.into().with(outer()))
    }
}
