//! 固定间隔、有限次数的重试工具。
//!
//! 用于删除在线部署目录/配置文件：刚停止的进程可能仍短暂持有文件句柄。
//! 默认策略为 10 次，每次间隔 3 秒；间隔只发生在两次尝试之间，最后一次失败后立即返回。
//!
//! 作者：Hangar 部署工具项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cancel::CancellationFlag;

/// 重试策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// 最大尝试次数（至少 1 次）。
    pub attempts: u32,
    /// 两次尝试之间的等待时间。
    #[serde(rename = "delay_secs", with = "duration_secs")]
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn fixed(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// 删除重试预算：10 次，间隔 3 秒。
    pub const fn default_delete() -> Self {
        Self::fixed(10, Duration::from_secs(3))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::default_delete()
    }
}

/// 重试失败原因。
#[derive(Debug)]
pub enum RetryError<E> {
    /// 用尽所有尝试次数，携带最后一次错误。
    Exhausted { attempts: u32, last: E },
    /// 遇到不可重试的错误，立即返回。
    Fatal { attempt: u32, error: E },
    /// 在两次尝试之间检测到取消。
    Cancelled,
}

/// 按固定间隔重试操作。
///
/// 参数：
/// - `policy`：尝试次数与间隔
/// - `cancel`：每次尝试前检查的取消标志
/// - `op`：操作本身，参数为当前尝试序号（从 1 开始）
/// - `is_retryable`：判断错误是否值得重试
///
/// 返回值：
/// - 第 k 次成功即返回，不会再有后续尝试
pub fn retry_fixed<T, E>(
    policy: RetryPolicy,
    cancel: &CancellationFlag,
    mut op: impl FnMut(u32) -> Result<T, E>,
    is_retryable: impl Fn(&E) -> bool,
) -> Result<T, RetryError<E>> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }
        match op(attempt) {
            Ok(v) => return Ok(v),
            Err(e) if !is_retryable(&e) => return Err(RetryError::Fatal { attempt, error: e }),
            Err(e) if attempt >= attempts => return Err(RetryError::Exhausted { attempts, last: e }),
            Err(_) => {
                debug!(attempt, max = attempts, "操作失败，等待后重试");
                if !policy.delay.is_zero() {
                    std::thread::sleep(policy.delay);
                }
                attempt += 1;
            }
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
