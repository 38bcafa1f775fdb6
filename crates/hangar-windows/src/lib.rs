//! Windows 平台能力实现（服务控制管理器、注册表、ACL、进程检测）。
//!
//! 目标：
//! - 将 Win32 细节集中封装，上层编排器只依赖能力接口
//! - 统一以 `anyhow::Result` 向上返回
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

pub mod acl;
pub mod registration;

#[cfg(windows)]
pub mod elevation;
#[cfg(windows)]
pub mod process;
#[cfg(windows)]
pub mod registry;
#[cfg(windows)]
pub mod service;

#[cfg(windows)]
pub use self::capabilities::WindowsCapabilities;

#[cfg(windows)]
mod capabilities {
    use hangar_core::platform::CapabilitySet;

    use crate::acl::IcaclsOwnership;
    use crate::service::ServiceController;

    /// Windows 平台能力集合。
    #[derive(Debug, Clone, Default)]
    pub struct WindowsCapabilities {
        services: ServiceController,
        ownership: IcaclsOwnership,
    }

    impl WindowsCapabilities {
        pub fn new(services: ServiceController) -> Self {
            Self {
                services,
                ownership: IcaclsOwnership,
            }
        }
    }

    impl CapabilitySet for WindowsCapabilities {
        type Probe = ServiceController;
        type Registrar = ServiceController;
        type Ownership = IcaclsOwnership;

        fn probe(&self) -> &ServiceController {
            &self.services
        }

        fn registrar(&self) -> &ServiceController {
            &self.services
        }

        fn ownership(&self) -> &IcaclsOwnership {
            &self.ownership
        }
    }
}
