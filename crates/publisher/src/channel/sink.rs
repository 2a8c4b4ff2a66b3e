//! 分发完成事件
//!
//! 记录持久化成功后的挂接点，用于通知客户端"有新消息可拉取"。
//! 默认不启用；启用后每条单用户记录或每个已写入的批次触发一次。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use notification_shared::kafka::{KafkaProducer, topics};

use crate::error::Result;
use crate::models::{NotificationMessage, UserId};

/// 分发完成事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchEvent {
    pub event_id: Uuid,
    pub message_id: i64,
    pub msg_type: String,
    /// 本次写入的接收者，批量分发时为单个批次
    pub user_ids: Vec<UserId>,
    pub dispatched_at: DateTime<Utc>,
}

impl DispatchEvent {
    /// 为已持久化的消息构造事件，消息没有 ID 时返回 None
    pub fn new(msg: &NotificationMessage, user_ids: Vec<UserId>) -> Option<Self> {
        Some(Self {
            event_id: Uuid::now_v7(),
            message_id: msg.id?,
            msg_type: msg.msg_type.name.clone(),
            user_ids,
            dispatched_at: Utc::now(),
        })
    }
}

/// 分发后挂接点
///
/// 调用时记录已经落库；实现返回的错误只会被记录，不会让分发失败。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DispatchSink: Send + Sync {
    async fn on_dispatched(&self, event: &DispatchEvent) -> Result<()>;
}

/// 基于 Kafka 的分发事件发布
pub struct KafkaDispatchSink {
    producer: KafkaProducer,
    topic: String,
}

impl KafkaDispatchSink {
    pub fn new(producer: KafkaProducer) -> Self {
        Self::with_topic(producer, topics::NOTIFICATION_DISPATCHED)
    }

    pub fn with_topic(producer: KafkaProducer, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl DispatchSink for KafkaDispatchSink {
    async fn on_dispatched(&self, event: &DispatchEvent) -> Result<()> {
        let key = event.message_id.to_string();
        let (partition, offset) = self.producer.send_json(&self.topic, &key, event).await?;

        debug!(
            topic = %self.topic,
            message_id = event.message_id,
            recipients = event.user_ids.len(),
            partition,
            offset,
            "分发事件已发布"
        );
        Ok(())
    }
}
