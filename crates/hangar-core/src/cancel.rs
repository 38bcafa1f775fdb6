//! 协作式取消标志。
//!
//! 编排器在每个主要步骤（解压、删除重试、注册、启动）开始前检查该标志。
//! 已经停止服务之后再取消，不保证回滚：调用方应预期服务处于停止状态。
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{DeployError, DeployResult};

/// 可在线程间共享的取消标志。
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// 请求取消。
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// 若已请求取消，返回 [`DeployError::Cancelled`]。
    pub fn check(&self, step: &'static str) -> DeployResult<()> {
        if self.is_cancelled() {
            return Err(DeployError::Cancelled(step).into());
        }
        Ok(())
    }
}
