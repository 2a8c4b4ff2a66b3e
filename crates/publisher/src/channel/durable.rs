//! 持久化渠道
//!
//! 唯一会修改存储状态的组件。两种分发形态：
//!
//! - 单用户：一次消息写入 + 一次记录写入，不分批
//! - 批量：消息写入一次，所有接收者的记录共享同一消息 ID；
//!   接收者按原始顺序累积到有界批次中，批次满即写入，遍历结束后写入剩余部分
//!
//! 批量分发中途失败时，之前已写入的批次不会回滚，错误以
//! `PartialDispatch` 返回并携带已写入的接收者数。重新调用会为已写入的接收者
//! 产生重复记录。
//!
//! 分发事件的发布有超时上限，broker 不可用时每个批次最多多等一个超时周期。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use tracing::{debug, info, instrument, warn};

use notification_shared::config::DispatchConfig;
use notification_shared::observability::metrics;

use super::{DispatchEvent, DispatchSink, NotificationChannel};
use crate::error::{PublisherError, Result};
use crate::models::{NotificationMessage, Recipients, UserId, UserNotification};
use crate::store::NotificationStore;

/// 单次批量写入的默认最大记录数
pub const MAX_BULK_USER_NOTIFICATION_SIZE: usize = 100;

/// 分发事件发布的默认超时
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_millis(500);

/// 持久化渠道
pub struct DurableChannel {
    name: String,
    store: Arc<dyn NotificationStore>,
    max_batch_size: usize,
    sink: Option<Arc<dyn DispatchSink>>,
    sink_timeout: Duration,
}

impl DurableChannel {
    pub const NAME: &'static str = "durable";

    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self {
            name: Self::NAME.to_string(),
            store,
            max_batch_size: MAX_BULK_USER_NOTIFICATION_SIZE,
            sink: None,
            sink_timeout: DEFAULT_SINK_TIMEOUT,
        }
    }

    /// 根据分发配置创建，推送挂接点由调用方按 `push_enabled` 决定是否传入
    pub fn from_config(
        store: Arc<dyn NotificationStore>,
        config: &DispatchConfig,
        sink: Option<Arc<dyn DispatchSink>>,
    ) -> Self {
        let channel = Self::new(store)
            .with_max_batch_size(config.max_bulk_batch_size)
            .with_sink_timeout(Duration::from_millis(config.push_timeout_ms));
        match sink {
            Some(sink) => channel.with_sink(sink),
            None => channel,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 批次大小至少为 1
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DispatchSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_sink_timeout(mut self, timeout: Duration) -> Self {
        self.sink_timeout = timeout;
        self
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// 写入一个批次并清空缓冲
    async fn flush(
        &self,
        batch: &mut Vec<UserNotification>,
        msg: &NotificationMessage,
    ) -> Result<usize> {
        let size = batch.len();
        self.store.bulk_create_user_notifications(&batch[..]).await?;

        metrics::record_bulk_flush(&self.name, size);
        metrics::record_records_created(&self.name, size);
        debug!(channel = %self.name, msg_id = ?msg.id, size, "批次已写入");

        if self.sink.is_some() {
            let user_ids = batch.iter().map(|r| r.user_id).collect();
            self.notify_sink(msg, user_ids).await;
        }

        batch.clear();
        Ok(size)
    }

    /// 遍历接收者并分块写入，`flushed` 实时反映已落库的接收者数
    async fn fan_out(
        &self,
        mut user_ids: BoxStream<'static, Result<UserId>>,
        capacity: usize,
        msg: &NotificationMessage,
        flushed: &mut usize,
    ) -> Result<()> {
        let mut batch = Vec::with_capacity(capacity);

        while let Some(user_id) = user_ids.next().await {
            batch.push(UserNotification::new(user_id?, msg)?);

            if batch.len() >= self.max_batch_size {
                *flushed += self.flush(&mut batch, msg).await?;
            }
        }

        if !batch.is_empty() {
            *flushed += self.flush(&mut batch, msg).await?;
        }

        Ok(())
    }

    async fn notify_sink(&self, msg: &NotificationMessage, user_ids: Vec<UserId>) {
        let Some(sink) = &self.sink else {
            return;
        };
        let Some(event) = DispatchEvent::new(msg, user_ids) else {
            return;
        };

        match tokio::time::timeout(self.sink_timeout, sink.on_dispatched(&event)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(
                    channel = %self.name,
                    message_id = event.message_id,
                    error = %e,
                    "分发事件发布失败，记录已持久化"
                );
            }
            Err(_) => {
                warn!(
                    channel = %self.name,
                    message_id = event.message_id,
                    timeout_ms = self.sink_timeout.as_millis() as u64,
                    "分发事件发布超时，记录已持久化"
                );
            }
        }
    }
}

#[async_trait]
impl NotificationChannel for DurableChannel {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, msg), fields(channel = %self.name, msg_type = %msg.msg_type.name))]
    async fn dispatch_notification_to_user(
        &self,
        user_id: UserId,
        msg: &NotificationMessage,
    ) -> Result<UserNotification> {
        let persisted = self.store.save_notification_message(msg).await?;
        let record = UserNotification::new(user_id, &persisted)?;
        let saved = self.store.save_user_notification(&record).await?;

        metrics::record_records_created(&self.name, 1);
        self.notify_sink(&persisted, vec![user_id]).await;

        Ok(saved)
    }

    #[instrument(
        skip(self, user_ids, msg),
        fields(channel = %self.name, msg_type = %msg.msg_type.name, source = user_ids.kind())
    )]
    async fn bulk_dispatch_notification(
        &self,
        user_ids: Recipients,
        msg: &NotificationMessage,
    ) -> Result<usize> {
        let persisted = self.store.save_notification_message(msg).await?;

        let capacity = user_ids
            .known_len()
            .map_or(self.max_batch_size, |len| len.min(self.max_batch_size));
        let mut flushed = 0;

        if let Err(e) = self
            .fan_out(user_ids.into_stream(), capacity, &persisted, &mut flushed)
            .await
        {
            warn!(
                channel = %self.name,
                msg_id = ?persisted.id,
                flushed,
                error = %e,
                "批量分发中断，已写入的批次不会回滚"
            );
            return Err(PublisherError::PartialDispatch {
                flushed,
                source: Box::new(e),
            });
        }

        info!(
            channel = %self.name,
            msg_id = ?persisted.id,
            recipients = flushed,
            batch_size = self.max_batch_size,
            "批量分发完成"
        );
        Ok(flushed)
    }
}
