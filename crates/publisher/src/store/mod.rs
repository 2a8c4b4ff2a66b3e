//! 通知存储层
//!
//! 定义存储接口，便于渠道和发布层依赖抽象而非具体实现，支持 mock 测试。
//!
//! ## 约定
//!
//! - 存储独占持久化保证，本层之上不开启跨消息与记录的事务
//! - `bulk_create_user_notifications` 对单次调用是全有或全无的：
//!   PostgreSQL 实现使用单条多行 INSERT，内存实现先校验整批再追加
//! - 存储错误原样返回，由调用方决定是否重试

mod memory;
mod postgres;

pub use memory::InMemoryNotificationStore;
pub use postgres::PgNotificationStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{NotificationMessage, NotificationType, UserId, UserNotification};

/// 通知存储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationStore: Send + Sync {
    // 通知类型
    async fn save_notification_type(&self, msg_type: &NotificationType) -> Result<()>;
    async fn get_notification_type(&self, name: &str) -> Result<Option<NotificationType>>;
    async fn get_all_notification_types(&self) -> Result<Vec<NotificationType>>;

    // 消息体，返回带存储分配 ID 的副本
    async fn save_notification_message(
        &self,
        msg: &NotificationMessage,
    ) -> Result<NotificationMessage>;
    async fn get_notification_message(&self, id: i64) -> Result<Option<NotificationMessage>>;

    // 用户通知记录
    async fn save_user_notification(&self, record: &UserNotification)
    -> Result<UserNotification>;
    async fn bulk_create_user_notifications(&self, records: &[UserNotification]) -> Result<()>;
    async fn count_user_notifications(&self, user_id: UserId, unread_only: bool) -> Result<i64>;
}
