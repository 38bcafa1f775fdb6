//! Linux（systemd）平台能力实现。
//!
//! - 服务探测/注册：单元文件 + `systemctl`
//! - 所有权：`chown`
//! - 进程检测：sysinfo 按完整路径匹配主程序
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

pub mod command;
pub mod elevation;
pub mod ownership;
pub mod process;
pub mod runner;
pub mod systemd;
pub mod unit_file;

use hangar_core::platform::CapabilitySet;

use crate::ownership::ChownOwnership;
use crate::systemd::{Systemd, SystemdSettings};

/// Linux 平台能力集合。
#[derive(Debug, Clone)]
pub struct SystemdCapabilities {
    systemd: Systemd,
    ownership: ChownOwnership,
}

impl SystemdCapabilities {
    pub fn new(settings: SystemdSettings) -> Self {
        let ownership = ChownOwnership::new(settings.chown.clone());
        Self {
            systemd: Systemd::new(settings),
            ownership,
        }
    }
}

impl CapabilitySet for SystemdCapabilities {
    type Probe = Systemd;
    type Registrar = Systemd;
    type Ownership = ChownOwnership;

    fn probe(&self) -> &Systemd {
        &self.systemd
    }

    fn registrar(&self) -> &Systemd {
        &self.systemd
    }

    fn ownership(&self) -> &ChownOwnership {
        &self.ownership
    }
}
