//! systemd 单元文件渲染（纯函数，所有平台均可测试）。
//!
//! 模板固定，渲染结果会与磁盘上的单元文件逐字比较，任何差异都会触发重新注册。
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::Path;

use hangar_core::platform::ServiceRegistrationDescriptor;

/// 固定环境变量。
pub const ENVIRONMENT: &[(&str, &str)] = &[
    ("ASPNETCORE_ENVIRONMENT", "Production"),
    ("DOTNET_PRINT_TELEMETRY_MESSAGE", "false"),
];

/// 渲染单元文件文本。
///
/// 参数：
/// - `descriptor`：期望的注册信息
/// - `dotnet_runner`：dotnet 运行器路径，`ExecStart` 为 `{runner} {主程序}`
pub fn render_unit(descriptor: &ServiceRegistrationDescriptor, dotnet_runner: &Path) -> String {
    let description = if descriptor.description.is_empty() {
        descriptor.service_env_name.as_str()
    } else {
        descriptor.description.as_str()
    };

    let mut unit = String::new();
    unit.push_str("[Unit]\n");
    unit.push_str(&format!("Description={description}\n"));
    unit.push('\n');
    unit.push_str("[Service]\n");
    unit.push_str(&format!(
        "WorkingDirectory={}\n",
        descriptor.working_directory.display()
    ));
    unit.push_str(&format!(
        "ExecStart={} {}\n",
        dotnet_runner.display(),
        descriptor.binary_path.display()
    ));
    unit.push_str("Restart=always\n");
    unit.push_str("RestartSec=10\n");
    unit.push_str("KillSignal=SIGINT\n");
    unit.push_str(&format!(
        "SyslogIdentifier={}\n",
        syslog_identifier(&descriptor.service_env_name)
    ));
    if let Some(user) = &descriptor.run_as_user {
        unit.push_str(&format!("User={user}\n"));
    }
    for (key, value) in ENVIRONMENT {
        unit.push_str(&format!("Environment={key}={value}\n"));
    }
    unit.push('\n');
    unit.push_str("[Install]\n");
    unit.push_str("WantedBy=multi-user.target\n");
    unit
}

/// 服务名去掉 `.` 后作为 syslog 标识。
pub fn syslog_identifier(service_env_name: &str) -> String {
    service_env_name.replace('.', "")
}
