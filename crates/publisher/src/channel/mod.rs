//! 通知渠道
//!
//! 定义通知渠道 trait 及渠道注册表。
//!
//! ## 渠道
//!
//! - **Durable**: 先持久化再返回，单用户逐条写入，批量按固定批次大小分块写入
//!
//! 渠道只负责写入存储，渲染与推送不在此层处理；推送通过可选的
//! [`DispatchSink`] 在持久化成功之后挂接。

mod durable;
mod registry;
mod sink;

pub use durable::{DurableChannel, MAX_BULK_USER_NOTIFICATION_SIZE};
pub use registry::{ChannelPreferences, ChannelRegistry, NoChannelPreferences};
pub use sink::{DispatchEvent, DispatchSink, KafkaDispatchSink};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{NotificationMessage, Recipients, UserId, UserNotification};

/// 通知渠道 trait
///
/// 渠道实现应当不持有跨调用的可变状态，每次调用的批次缓冲都是调用内局部的。
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// 渠道名称（用于注册表和日志）
    fn name(&self) -> &str;

    /// 单用户分发
    ///
    /// 先持久化消息，再创建并持久化一条未读记录，返回带存储 ID 的记录。
    async fn dispatch_notification_to_user(
        &self,
        user_id: UserId,
        msg: &NotificationMessage,
    ) -> Result<UserNotification>;

    /// 批量分发
    ///
    /// 消息只持久化一次，接收者按原始顺序分块写入，返回处理的接收者总数。
    async fn bulk_dispatch_notification(
        &self,
        user_ids: Recipients,
        msg: &NotificationMessage,
    ) -> Result<usize>;
}
