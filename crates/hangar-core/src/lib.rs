//! Hangar 部署核心库（跨平台/与操作系统无关）。
//!
//! 功能：
//! - 定义部署请求中的值对象（服务标识、安装目录布局、归档描述、配置文件载荷）
//! - 定义错误分类与“有序错误列表”返回约定
//! - 定义平台能力接口（服务探测/服务注册/所有权管理），由各平台 crate 实现
//! - 提供安装编排器（停止 → 解压 → 替换 → 授权 → 注册/校验 → 启动）
//! - 提供上层更新流程（从交换目录查找最新归档/配置文件并委托编排器）
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

pub mod archive;
pub mod artifact;
pub mod cancel;
pub mod config;
pub mod error;
pub mod identity;
pub mod installer;
pub mod manager;
pub mod paths;
pub mod platform;
pub mod progress;
pub mod retry;
pub mod settings;
pub mod updater;
