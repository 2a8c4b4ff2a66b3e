//! 通知消息模型
//!
//! 消息体在一次发布中只持久化一次，所有接收者的 UserNotification 共享同一条消息。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{NotificationType, UserId};
use crate::error::{PublisherError, Result};

/// 通知消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    /// 存储分配的主键，持久化之前为 None
    pub id: Option<i64>,
    pub msg_type: NotificationType,
    #[validate(length(min = 1, max = 255, message = "namespace 不能为空"))]
    pub namespace: Option<String>,
    pub from_user_id: Option<UserId>,
    /// 任意结构化内容，必须是非空 JSON 对象
    pub payload: serde_json::Value,
    /// 优先级（0-10，10 最高）
    #[validate(range(min = 0, max = 10, message = "优先级必须在0-10之间"))]
    pub priority: i32,
    pub created: Option<DateTime<Utc>>,
    pub deliver_no_earlier_than: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NotificationMessage {
    /// 创建未持久化的消息
    pub fn new(msg_type: NotificationType, payload: serde_json::Value) -> Self {
        Self {
            id: None,
            msg_type,
            namespace: None,
            from_user_id: None,
            payload,
            priority: 0,
            created: None,
            deliver_no_earlier_than: None,
            expires_at: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_sender(mut self, from_user_id: UserId) -> Self {
        self.from_user_id = Some(from_user_id);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_delivery_window(
        mut self,
        deliver_no_earlier_than: Option<DateTime<Utc>>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.deliver_no_earlier_than = deliver_no_earlier_than;
        self.expires_at = expires_at;
        self
    }

    /// 是否已持久化
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// 结构校验
    ///
    /// 任何持久化之前都必须通过；校验失败不会产生副作用
    pub fn validate(&self) -> Result<()> {
        self.msg_type.validate()?;
        Validate::validate(self)?;

        match self.payload.as_object() {
            Some(map) if !map.is_empty() => {}
            Some(_) => {
                return Err(PublisherError::Validation(
                    "payload 不能为空对象".to_string(),
                ));
            }
            None => {
                return Err(PublisherError::Validation(format!(
                    "payload 必须是 JSON 对象，实际为 {}",
                    json_type_name(&self.payload)
                )));
            }
        }

        if let (Some(start), Some(end)) = (self.deliver_no_earlier_than, self.expires_at)
            && end <= start
        {
            return Err(PublisherError::Validation(
                "expires_at 必须晚于 deliver_no_earlier_than".to_string(),
            ));
        }

        Ok(())
    }
}

/// JSON 值的类型名，用于错误信息
pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
