//! 进度消息旁路通道。
//!
//! 失败与关键步骤会同时写日志并转发给进度接收方（例如远程调用方的消息通道）。
//! 该通道不影响操作的成功/失败结果。
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

/// 进度消息接收方。
pub trait ProgressSink: Send + Sync {
    /// 普通进度消息。
    fn message(&self, text: &str);

    /// 错误消息。
    fn error(&self, text: &str);
}

/// 不转发任何消息。
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn message(&self, _text: &str) {}

    fn error(&self, _text: &str) {}
}
