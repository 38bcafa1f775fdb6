//! systemd 服务探测与注册（单元文件 + `systemctl`）。
//!
//! 说明：
//! - 服务“存在”即单元目录下存在 `{name}.service`
//! - 写入/删除单元文件后执行 `systemctl daemon-reload`
//! - 启停使用 `--no-block`，随后轮询 `is-active` 确认状态
//!
//! 权限要求：
//! - 写单元目录与调用 systemctl 需要 root
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use hangar_core::cancel::CancellationFlag;
use hangar_core::platform::{ServiceHostProbe, ServiceRegistrar, ServiceRegistrationDescriptor};
use hangar_core::retry::{retry_fixed, RetryError, RetryPolicy};
use tracing::{info, warn};

use crate::command::{run_checked, run_raw};
use crate::process::is_binary_in_use;
use crate::runner::resolve_dotnet_runner;
use crate::unit_file::render_unit;

/// systemd 相关设置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemdSettings {
    /// 单元文件目录，默认 `/etc/systemd/system`。
    pub unit_dir: PathBuf,
    /// dotnet 运行器；为空时通过 `which dotnet` 查找。
    pub dotnet_runner: Option<PathBuf>,
    pub systemctl: String,
    pub chown: String,
    /// 启停后确认状态的轮询策略。
    pub state_poll: RetryPolicy,
}

impl Default for SystemdSettings {
    fn default() -> Self {
        Self {
            unit_dir: PathBuf::from("/etc/systemd/system"),
            dotnet_runner: None,
            systemctl: "systemctl".to_string(),
            chown: "chown".to_string(),
            state_poll: RetryPolicy::fixed(15, Duration::from_secs(1)),
        }
    }
}

/// 基于 systemd 的服务探测与注册。
#[derive(Debug, Clone)]
pub struct Systemd {
    settings: SystemdSettings,
}

impl Systemd {
    pub fn new(settings: SystemdSettings) -> Self {
        Self { settings }
    }

    /// 单元文件路径：`{unit_dir}/{name}.service`。
    pub fn unit_path(&self, service_env_name: &str) -> PathBuf {
        self.settings
            .unit_dir
            .join(format!("{service_env_name}.service"))
    }

    fn systemctl(&self, verb: &str, service_env_name: &str) -> Result<()> {
        run_checked(
            &self.settings.systemctl,
            &["--no-ask-password", "--no-block", "--quiet", verb, service_env_name],
        )
    }

    fn daemon_reload(&self) -> Result<()> {
        run_checked(
            &self.settings.systemctl,
            &["--no-ask-password", "--quiet", "daemon-reload"],
        )
    }

    fn expected_unit(&self, descriptor: &ServiceRegistrationDescriptor) -> Result<String> {
        let runner = resolve_dotnet_runner(self.settings.dotnet_runner.as_deref())?;
        Ok(render_unit(descriptor, &runner))
    }

    /// 轮询直到服务运行状态等于 `want_running`。
    fn wait_for_state(&self, service_env_name: &str, want_running: bool) -> Result<()> {
        let result = retry_fixed(
            self.settings.state_poll,
            &CancellationFlag::new(),
            |_| {
                if self.is_running(service_env_name) == want_running {
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

impl ServiceHostProbe for Systemd {
    fn exists(&self, service_env_name: &str) -> bool {
        self.unit_path(service_env_name).is_file()
    }

    fn is_running(&self, service_env_name: &str) -> bool {
        run_raw(
            &self.settings.systemctl,
            &["--no-ask-password", "--quiet", "is-active", service_env_name],
        )
        .map(|out| out.status.success())
        .unwrap_or(false)
    }

    fn is_process_running(&self, main_binary: &Path) -> bool {
        is_binary_in_use(main_binary)
    }
}

impl ServiceRegistrar for Systemd {
    fn is_registered_properly(&self, descriptor: &ServiceRegistrationDescriptor) -> Result<bool> {
        let path = self.unit_path(&descriptor.service_env_name);
        let actual = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(e).with_context(|| format!("读取单元文件失败: {}", path.display()))
            }
        };
        let expected = self.expected_unit(descriptor)?;
        let proper = actual == expected;
        if !proper {
            info!(unit = %path.display(), "单元文件内容与期望不一致");
        }
        Ok(proper)
    }

    fn register(&self, descriptor: &ServiceRegistrationDescriptor) -> Result<()> {
        let name = &descriptor.service_env_name;
        let unit = self.expected_unit(descriptor)?;
        let path = self.unit_path(name);
        std::fs::create_dir_all(&self.settings.unit_dir)
            .with_context(|| format!("创建单元目录失败: {}", self.settings.unit_dir.display()))?;
        std::fs::write(&path, unit)
            .with_context(|| format!("写入单元文件失败: {}", path.display()))?;
        info!(unit = %path.display(), "已写入单元文件");

        self.daemon_reload()?;
        self.systemctl("enable", name)?;
        if !self.exists(name) {
            return Err(anyhow!("注册后未找到服务: {name}"));
        }
        Ok(())
    }

    fn remove(&self, service_env_name: &str) -> Result<()> {
        self.systemctl("disable", service_env_name)?;
        let path = self.unit_path(service_env_name);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(unit = %path.display(), "单元文件已不存在");
            }
            Err(e) => {
                return Err(e).with_context(|| format!("删除单元文件失败: {}", path.display()))
            }
        }
        self.daemon_reload()
    }

    fn stop(&self, service_env_name: &str) -> Result<()> {
        if !self.is_running(service_env_name) {
            return Ok(());
        }
        self.systemctl("stop", service_env_name)?;
        self.wait_for_state(service_env_name, false)
    }

    fn start(&self, service_env_name: &str) -> Result<()> {
        if self.is_running(service_env_name) {
            return Ok(());
        }
        self.systemctl("start", service_env_name)?;
        self.wait_for_state(service_env_name, true)
    }
}
