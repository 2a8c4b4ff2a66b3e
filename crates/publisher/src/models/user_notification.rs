//! 用户通知记录模型
//!
//! 每个接收者一条，是扇出的最小单位。记录只通过消息 ID 引用消息体，
//! 因此必须在消息持久化之后才能构造。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{NotificationMessage, UserId};
use crate::error::{PublisherError, Result};

/// 用户通知记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserNotification {
    /// 存储分配的主键，持久化之前为 None
    pub id: Option<i64>,
    pub user_id: UserId,
    pub msg_id: i64,
    /// 为空表示未读
    pub read_at: Option<DateTime<Utc>>,
    pub user_context: Option<serde_json::Value>,
    #[sqlx(rename = "created_at")]
    pub created: DateTime<Utc>,
}

impl UserNotification {
    /// 为已持久化的消息创建一条未读记录
    ///
    /// 消息没有存储分配的 ID 时返回内部错误
    pub fn new(user_id: UserId, msg: &NotificationMessage) -> Result<Self> {
        let msg_id = msg.id.ok_or_else(|| {
            PublisherError::Internal("消息尚未持久化，无法创建用户通知记录".to_string())
        })?;

        Ok(Self {
            id: None,
            user_id,
            msg_id,
            read_at: None,
            user_context: None,
            created: Utc::now(),
        })
    }

    pub fn with_user_context(mut self, context: serde_json::Value) -> Self {
        self.user_context = Some(context);
        self
    }

    pub fn is_unread(&self) -> bool {
        self.read_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationType;
    use serde_json::json;

    fn message(id: Option<i64>) -> NotificationMessage {
        let mut msg = NotificationMessage::new(
            NotificationType::new("forum-reply", "basic-text"),
            json!({"subject": "hello"}),
        );
        msg.id = id;
        msg
    }

    #[test]
    fn test_new_record_is_unread() {
        let record = UserNotification::new(42, &message(Some(9))).unwrap();
        assert_eq!(record.user_id, 42);
        assert_eq!(record.msg_id, 9);
        assert!(record.id.is_none());
        assert!(record.is_unread());
    }

    #[test]
    fn test_unpersisted_message_rejected() {
        let result = UserNotification::new(42, &message(None));
        assert!(matches!(result, Err(PublisherError::Internal(_))));
    }

    #[test]
    fn test_user_context() {
        let record = UserNotification::new(1, &message(Some(1)))
            .unwrap()
            .with_user_context(json!({"course": "cs101"}));
        assert_eq!(record.user_context, Some(json!({"course": "cs101"})));
    }
}
