//! 服务部署/更新命令行工具（hangar-deployer）。
//!
//! 职责：
//! - 读取 `hangar.json`，从交换目录取最新程序归档/配置文件并安装到本机
//! - 以服务方式部署时注册并启动操作系统服务（Windows 服务 / systemd 单元）
//! - 提供移除、启停与只读查询命令
//!
//! 权限要求：
//! - 修改类命令需要管理员（Windows）或 root（Linux）权限
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use hangar_core::artifact::LocalFolderStore;
use hangar_core::config::HangarConfig;
use hangar_core::identity::ServiceIdentity;
use hangar_core::installer::{DeploymentTarget, Installer, InstallerSettings, SettingsUpdateOutcome};
use hangar_core::manager::{LocalProjectManager, ProjectManager};
use hangar_core::progress::ProgressSink;
use hangar_core::updater::{ParametersUpdateRequest, ProgramUpdateRequest};
use tracing::info;

#[cfg(windows)]
type Platform = hangar_windows::WindowsCapabilities;
#[cfg(not(windows))]
type Platform = hangar_linux::SystemdCapabilities;

/// 命令行参数。
///
/// 说明：
/// - `config` 指向部署配置文件（默认 `hangar.json`）
/// - `silent` 用于批量部署场景（不输出进度消息）
#[derive(Debug, Parser)]
#[command(name = "hangar-deployer", version)]
struct Cli {
    #[arg(long, default_value = "hangar.json")]
    config: PathBuf,

    #[arg(long, default_value_t = false)]
    silent: bool,

    #[command(subcommand)]
    command: Commands,
}

/// 项目 + 环境。
#[derive(Debug, Args)]
struct TargetArgs {
    #[arg(long)]
    project: String,

    #[arg(long)]
    environment: String,
}

impl TargetArgs {
    fn identity(&self) -> ServiceIdentity {
        ServiceIdentity::new(self.project.clone(), self.environment.clone())
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// 安装或更新程序（输出部署的版本号）。
    Install {
        #[command(flatten)]
        target: TargetArgs,
        /// 以服务方式部署。
        #[arg(long, default_value_t = false)]
        service: bool,
        /// 服务描述。
        #[arg(long)]
        description: Option<String>,
        /// 同时下发最新配置文件，安装为该文件名（例如 `appsettings.json`）。
        #[arg(long)]
        settings_file: Option<String>,
    },
    /// 仅更新配置文件（输出 `updated` 或 `unchanged`）。
    UpdateSettings {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long)]
        settings_file: String,
        #[arg(long, default_value_t = false)]
        service: bool,
    },
    /// 移除项目（服务方式时同时移除服务注册）。
    Remove {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long, default_value_t = false)]
        service: bool,
    },
    /// 启动服务。
    Start {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// 停止服务。
    Stop {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// 输出交换目录中最新的程序归档文件名（不做系统修改）。
    Latest {
        #[command(flatten)]
        target: TargetArgs,
    },
}

/// 控制台进度输出（stderr），stdout 只输出命令结果。
struct ConsoleProgress {
    silent: bool,
}

impl ProgressSink for ConsoleProgress {
    fn message(&self, text: &str) {
        if !self.silent {
            eprintln!("{text}");
        }
    }

    fn error(&self, text: &str) {
        eprintln!("错误: {text}");
    }
}

/// 程序入口：解析参数并分发子命令。
///
/// 异常处理：
/// - 任意子命令执行失败会返回 `Err`，进程以非 0 退出码结束。
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if !matches!(cli.command, Commands::Latest { .. }) {
        ensure_elevated()?;
    }

    let (config, manager) = build_manager(&cli)?;
    match &cli.command {
        Commands::Install {
            target,
            service,
            description,
            settings_file,
        } => {
            let request = ProgramUpdateRequest {
                target: DeploymentTarget::new(target.identity(), config.ownership()),
                service: service.then(|| config.service_options(description.clone())),
                app_settings_file_name: settings_file.clone(),
            };
            let version = manager.install_program(&request)?;
            info!(%version, "安装完成");
            println!("{version}");
        }
        Commands::UpdateSettings {
            target,
            settings_file,
            service,
        } => {
            let request = ParametersUpdateRequest {
                target: DeploymentTarget::new(target.identity(), config.ownership()),
                is_service: *service,
                app_settings_file_name: settings_file.clone(),
            };
            match manager.update_app_parameters(&request)? {
                SettingsUpdateOutcome::Updated => println!("updated"),
                SettingsUpdateOutcome::AlreadyCurrent { .. } => println!("unchanged"),
            }
        }
        Commands::Remove { target, service } => {
            manager.remove_project(&target.identity(), *service)?;
            info!(project = %target.project, environment = %target.environment, "已移除");
        }
        Commands::Start { target } => manager.start_service(&target.identity())?,
        Commands::Stop { target } => manager.stop_service(&target.identity())?,
        Commands::Latest { target } => {
            println!("{}", manager.latest_program(&target.identity())?);
        }
    }
    Ok(())
}

fn allow_non_admin_for_tests() -> bool {
    matches!(
        std::env::var("HANGAR_TEST_ALLOW_NON_ADMIN").as_deref(),
        Ok("1")
    )
}

fn ensure_elevated() -> Result<()> {
    if allow_non_admin_for_tests() || is_elevated()? {
        return Ok(());
    }
    if cfg!(windows) {
        Err(anyhow!("该命令需要管理员权限，请以管理员方式运行"))
    } else {
        Err(anyhow!("该命令需要 root 权限"))
    }
}

#[cfg(windows)]
fn is_elevated() -> Result<bool> {
    hangar_windows::elevation::is_running_as_admin()
}

#[cfg(not(windows))]
fn is_elevated() -> Result<bool> {
    hangar_linux::elevation::is_running_as_root()
}

#[cfg(windows)]
fn platform(_config: &HangarConfig, _base: &Path) -> Result<Platform> {
    Ok(hangar_windows::WindowsCapabilities::default())
}

#[cfg(not(windows))]
fn platform(config: &HangarConfig, base: &Path) -> Result<Platform> {
    use hangar_core::paths::resolve_path;
    use hangar_linux::systemd::SystemdSettings;

    let linux = &config.linux;
    let dotnet_runner = match linux.dotnet_runner.as_deref() {
        Some(raw) if !raw.trim().is_empty() => Some(resolve_path(base, raw)?),
        _ => None,
    };
    Ok(hangar_linux::SystemdCapabilities::new(SystemdSettings {
        unit_dir: resolve_path(base, &linux.unit_dir)?,
        dotnet_runner,
        systemctl: linux.systemctl.clone(),
        chown: linux.chown.clone(),
        ..SystemdSettings::default()
    }))
}

/// 当前程序名称（可执行文件名去掉扩展名），用于“禁止更新自身”检查。
fn own_program_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}

/// 读取配置并构造本地项目管理器。
///
/// 说明：
/// - 配置中的相对路径按配置文件所在目录解析
fn build_manager(cli: &Cli) -> Result<(HangarConfig, LocalProjectManager<Platform, LocalFolderStore>)> {
    let config = HangarConfig::load(&cli.config)?;
    let base = cli
        .config
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let folders = config.resolve_folders(&base)?;

    let installer = Installer::new(
        InstallerSettings {
            install_root: folders.install_root,
            work_folder: folders.work_folder,
            own_program_name: own_program_name(),
            delete_retry: config.delete_retry,
        },
        platform(&config, &base)?,
    )
    .with_progress(ConsoleProgress { silent: cli.silent });

    let manager = LocalProjectManager::new(
        installer,
        LocalFolderStore::new(folders.exchange_folder),
        config.naming(),
    );
    Ok((config, manager))
}
