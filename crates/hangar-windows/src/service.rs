//! Windows 服务探测/注册/启停（基于 `windows-service` crate）。
//!
//! 说明：
//! - 注册使用 Automatic 启动类型，显示名即服务名，随后写入描述
//! - 注册信息通过注册表 `ImagePath`/`Description` 校验
//! - 移除前要求服务已停止；“检查后再删除”不是原子操作，检查与删除之间服务仍可能被外部启动
//!
//! 权限要求：
//! - 创建/删除/启停服务需要管理员权限
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use hangar_core::cancel::CancellationFlag;
use hangar_core::platform::{ServiceHostProbe, ServiceRegistrar, ServiceRegistrationDescriptor};
use hangar_core::retry::{retry_fixed, RetryError, RetryPolicy};
use tracing::{info, warn};
use windows_service::service::{
    ServiceAccess, ServiceErrorControl, ServiceInfo, ServiceStartType, ServiceState, ServiceType,
};
use windows_service::service_manager::{ServiceManager, ServiceManagerAccess};

use crate::process::is_binary_in_use;
use crate::registration::is_registration_proper;
use crate::registry::read_registered_service;

/// ERROR_SERVICE_DOES_NOT_EXIST。
const ERROR_SERVICE_DOES_NOT_EXIST: i32 = 1060;

/// 服务控制管理器封装。
#[derive(Debug, Clone)]
pub struct ServiceController {
    state_poll: RetryPolicy,
}

impl Default for ServiceController {
    fn default() -> Self {
        Self::new(RetryPolicy::fixed(30, Duration::from_secs(1)))
    }
}

impl ServiceController {
    /// 参数：
    /// - `state_poll`：启停后等待目标状态的轮询策略
    pub fn new(state_poll: RetryPolicy) -> Self {
        Self { state_poll }
    }

    fn manager(access: ServiceManagerAccess) -> Result<ServiceManager> {
        ServiceManager::local_computer(None::<&str>, access).context("打开 ServiceManager 失败")
    }

    fn query_state(&self, service_env_name: &str) -> Result<Option<ServiceState>> {
        let manager = Self::manager(ServiceManagerAccess::CONNECT)?;
        match manager.open_service(service_env_name, ServiceAccess::QUERY_STATUS) {
            Ok(service) => {
                let status = service
                    .query_status()
                    .with_context(|| format!("查询服务状态失败: {service_env_name}"))?;
                Ok(Some(status.current_state))
            }
            Err(windows_service::Error::Winapi(e))
                if e.raw_os_error() == Some(ERROR_SERVICE_DOES_NOT_EXIST) =>
            {
                Ok(None)
            }
            Err(e) => Err(e).with_context(|| format!("打开服务失败: {service_env_name}")),
        }
    }

    fn wait_for(&self, service_env_name: &str, want_running: bool) -> Result<()> {
        let result = retry_fixed(
            self.state_poll,
            &CancellationFlag::new(),
            |_| {
                let running = self.is_running(service_env_name);
                if running == want_running {
                    Ok(())
                } else {
                    Err(())
                }
            },
            |_| true,
        );
        match result {
            Ok(()) => Ok(()),
            Err(RetryError::Exhausted { attempts, .. }) => Err(anyhow!(
                "服务 {service_env_name} 在 {attempts} 次检查后仍未{}",
                if want_running { "运行" } else { "停止" }
            )),
            Err(_) => Err(anyhow!("等待服务状态被中断: {service_env_name}")),
        }
    }
}

fn is_running_state(state: ServiceState) -> bool {
    !matches!(state, ServiceState::Stopped | ServiceState::StopPending)
}

impl ServiceHostProbe for ServiceController {
    fn exists(&self, service_env_name: &str) -> bool {
        matches!(self.query_state(service_env_name), Ok(Some(_)))
    }

    fn is_running(&self, service_env_name: &str) -> bool {
        match self.query_state(service_env_name) {
            Ok(Some(state)) => is_running_state(state),
            Ok(None) => false,
            Err(e) => {
                warn!("查询服务状态失败: {e:#}");
                false
            }
        }
    }

    fn is_process_running(&self, main_binary: &Path) -> bool {
        is_binary_in_use(main_binary)
    }
}

impl ServiceRegistrar for ServiceController {
    fn is_registered_properly(&self, descriptor: &ServiceRegistrationDescriptor) -> Result<bool> {
        let Some(actual) = read_registered_service(&descriptor.service_env_name)? else {
            return Ok(false);
        };
        let proper = is_registration_proper(&actual, descriptor);
        if !proper {
            info!(service = %descriptor.service_env_name, ?actual, "服务注册信息与期望不一致");
        }
        Ok(proper)
    }

    fn register(&self, descriptor: &ServiceRegistrationDescriptor) -> Result<()> {
        let name = &descriptor.service_env_name;
        let manager =
            Self::manager(ServiceManagerAccess::CONNECT | ServiceManagerAccess::CREATE_SERVICE)?;
        if descriptor.run_as_user.is_some() {
            // 服务以 LocalSystem 运行，账户只用于授权
            info!(service = %name, "Windows 服务不使用 run_as_user 作为登录账户");
        }

        let info = ServiceInfo {
            name: OsString::from(name),
            display_name: OsString::from(name),
            service_type: ServiceType::OWN_PROCESS,
            start_type: ServiceStartType::AutoStart,
            error_control: ServiceErrorControl::Normal,
            executable_path: descriptor.binary_path.clone(),
            launch_arguments: vec![],
            dependencies: vec![],
            account_name: None,
            account_password: None,
        };
        let service = manager
            .create_service(&info, ServiceAccess::CHANGE_CONFIG)
            .with_context(|| format!("创建服务失败: {name}"))?;
        if !descriptor.description.is_empty() {
            service
                .set_description(&descriptor.description)
                .with_context(|| format!("设置服务描述失败: {name}"))?;
        }

        if !self.exists(name) {
            return Err(anyhow!("注册后未找到服务: {name}"));
        }
        Ok(())
    }

    fn remove(&self, service_env_name: &str) -> Result<()> {
        match self.query_state(service_env_name)? {
            None => return Ok(()),
            Some(ServiceState::Stopped) => {}
            Some(state) => {
                return Err(anyhow!(
                    "服务未停止，不能移除: {service_env_name} ({state:?})"
                ))
            }
        }
        let manager = Self::manager(ServiceManagerAccess::CONNECT)?;
        let service = manager
            .open_service(service_env_name, ServiceAccess::DELETE)
            .with_context(|| format!("打开服务失败: {service_env_name}"))?;
        service
            .delete()
            .with_context(|| format!("删除服务失败: {service_env_name}"))
    }

    fn stop(&self, service_env_name: &str) -> Result<()> {
        if !self.is_running(service_env_name) {
            return Ok(());
        }
        let manager = Self::manager(ServiceManagerAccess::CONNECT)?;
        let service = manager
            .open_service(service_env_name, ServiceAccess::STOP | ServiceAccess::QUERY_STATUS)
            .with_context(|| format!("打开服务失败: {service_env_name}"))?;
        service
            .stop()
            .with_context(|| format!("停止服务失败: {service_env_name}"))?;
        self.wait_for(service_env_name, false)
    }

    fn start(&self, service_env_name: &str) -> Result<()> {
        if self.is_running(service_env_name) {
            return Ok(());
        }
        let manager = Self::manager(ServiceManagerAccess::CONNECT)?;
        let service = manager
            .open_service(service_env_name, ServiceAccess::START | ServiceAccess::QUERY_STATUS)
            .with_context(|| format!("打开服务失败: {service_env_name}"))?;
        service
            .start::<&OsStr>(&[])
            .with_context(|| format!("启动服务失败: {service_env_name}"))?;
        self.wait_for(service_env_name, true)
    }
}
