//! 通知发布 API
//!
//! 对外的发布入口：校验消息、解析渠道、委托渠道分发、返回结果。
//! 存储访问和渠道解析都对调用方隐藏。
//!
//! ## 错误策略
//!
//! - 校验失败和接收者类型错误在任何存储写入之前返回
//! - 渠道解析失败直接返回，本层不重试
//! - 存储错误原样向上传播；批量发布的中途失败以 `PartialDispatch` 返回

use std::sync::Arc;

use tracing::{info, instrument, warn};

use notification_shared::config::NotificationTypeSeed;
use notification_shared::observability::metrics;

use crate::channel::ChannelRegistry;
use crate::error::{PublisherError, Result};
use crate::models::{NotificationMessage, NotificationType, Recipients, UserId, UserNotification};
use crate::renderer::RendererRegistry;
use crate::store::NotificationStore;

const MODE_SINGLE: &str = "single";
const MODE_BULK: &str = "bulk";

/// 分析事件的日志 target，下游可按 target 单独采集
const ANALYTICS_TARGET: &str = "notification_analytics";

/// 通知发布者
///
/// 存储、渠道注册表和渲染器注册表都通过构造参数显式注入。
#[derive(Clone)]
pub struct NotificationPublisher {
    store: Arc<dyn NotificationStore>,
    channels: Arc<ChannelRegistry>,
    renderers: Arc<RendererRegistry>,
}

impl NotificationPublisher {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        channels: Arc<ChannelRegistry>,
        renderers: Arc<RendererRegistry>,
    ) -> Self {
        Self {
            store,
            channels,
            renderers,
        }
    }

    pub fn renderers(&self) -> &RendererRegistry {
        &self.renderers
    }

    // ==================== 通知类型 ====================

    /// 注册通知类型
    ///
    /// 同名重复注册以最后一次的 renderer 为准；渲染器重复注册是空操作
    #[instrument(skip(self, msg_type), fields(name = %msg_type.name, renderer = %msg_type.renderer))]
    pub async fn register_notification_type(&self, msg_type: &NotificationType) -> Result<()> {
        msg_type.validate()?;

        self.store.save_notification_type(msg_type).await?;
        let renderer_added = self.renderers.register_renderer(&msg_type.renderer);

        info!(renderer_added, "通知类型已注册");
        Ok(())
    }

    /// 按顺序注册启动时配置的类型，遇到第一个失败即停止并返回该错误
    pub async fn register_seed_types(&self, seeds: &[NotificationTypeSeed]) -> Result<usize> {
        for seed in seeds {
            let msg_type = NotificationType::new(seed.name.as_str(), seed.renderer.as_str());
            self.register_notification_type(&msg_type).await?;
        }
        Ok(seeds.len())
    }

    pub async fn get_notification_type(&self, type_name: &str) -> Result<NotificationType> {
        self.store
            .get_notification_type(type_name)
            .await?
            .ok_or_else(|| PublisherError::NotificationTypeNotFound(type_name.to_string()))
    }

    pub async fn get_all_notification_types(&self) -> Result<Vec<NotificationType>> {
        self.store.get_all_notification_types().await
    }

    // ==================== 发布 ====================

    /// 发布给单个用户
    ///
    /// `user_id` 必须为正数。成功时持久化一条消息和一条记录，返回带存储 ID 的记录。
    #[instrument(skip(self, msg), fields(msg_type = %msg.msg_type.name))]
    pub async fn publish_notification_to_user(
        &self,
        user_id: UserId,
        msg: &NotificationMessage,
    ) -> Result<UserNotification> {
        let result = self.publish_single(user_id, msg).await;

        match &result {
            Ok(record) => {
                metrics::record_publish(MODE_SINGLE, 1);
                info!(
                    target: ANALYTICS_TARGET,
                    mode = MODE_SINGLE,
                    msg_id = record.msg_id,
                    msg_type = %msg.msg_type.name,
                    recipients = 1,
                    "通知已发布"
                );
            }
            Err(e) => self.record_failure(MODE_SINGLE, e),
        }

        result
    }

    /// 批量发布
    ///
    /// 接收者可以是列表、惰性迭代器、结果游标，或者先经过类型检查的 JSON 值；
    /// 不受支持的输入在任何存储调用之前返回 `UnsupportedInput`。
    /// 渠道按通知类型解析，不绑定具体用户。返回处理的接收者总数。
    #[instrument(skip(self, user_ids, msg), fields(msg_type = %msg.msg_type.name))]
    pub async fn bulk_publish_notification_to_users<R, E>(
        &self,
        user_ids: R,
        msg: &NotificationMessage,
    ) -> Result<usize>
    where
        R: TryInto<Recipients, Error = E>,
        E: Into<PublisherError>,
    {
        let result = match user_ids.try_into() {
            Ok(recipients) => self.publish_bulk(recipients, msg).await,
            Err(e) => Err(e.into()),
        };

        match &result {
            Ok(count) => {
                metrics::record_publish(MODE_BULK, *count);
                info!(
                    target: ANALYTICS_TARGET,
                    mode = MODE_BULK,
                    msg_type = %msg.msg_type.name,
                    recipients = *count,
                    "通知已发布"
                );
            }
            Err(e) => self.record_failure(MODE_BULK, e),
        }

        result
    }

    /// 用户未读通知数
    pub async fn get_unread_count(&self, user_id: UserId) -> Result<i64> {
        ensure_positive_user_id(user_id)?;
        self.store.count_user_notifications(user_id, true).await
    }

    async fn publish_single(
        &self,
        user_id: UserId,
        msg: &NotificationMessage,
    ) -> Result<UserNotification> {
        ensure_positive_user_id(user_id)?;
        msg.validate()?;

        let channel = self
            .channels
            .get_notification_channel(Some(user_id), &msg.msg_type.name)?;

        channel.dispatch_notification_to_user(user_id, msg).await
    }

    async fn publish_bulk(&self, recipients: Recipients, msg: &NotificationMessage) -> Result<usize> {
        msg.validate()?;

        let channel = self
            .channels
            .get_notification_channel(None, &msg.msg_type.name)?;

        info!(
            channel = channel.name(),
            source = recipients.kind(),
            known_len = ?recipients.known_len(),
            "开始批量发布"
        );

        channel.bulk_dispatch_notification(recipients, msg).await
    }

    fn record_failure(&self, mode: &str, error: &PublisherError) {
        metrics::record_publish_failure(mode, error.error_code());
        warn!(
            mode,
            code = error.error_code(),
            flushed = ?error.flushed_count(),
            error = %error,
            "通知发布失败"
        );
    }
}

fn ensure_positive_user_id(user_id: UserId) -> Result<()> {
    if user_id <= 0 {
        return Err(PublisherError::Validation(format!(
            "user_id 必须为正整数，实际为 {}",
            user_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::DurableChannel;
    use crate::store::MockNotificationStore;
    use serde_json::json;

    fn publisher_with(store: MockNotificationStore) -> NotificationPublisher {
        let store: Arc<dyn NotificationStore> = Arc::new(store);
        let mut channels = ChannelRegistry::new();
        channels.register(Arc::new(
            DurableChannel::new(store.clone()).with_max_batch_size(2),
        ));
        channels.set_default(DurableChannel::NAME).unwrap();

        NotificationPublisher::new(
            store,
            Arc::new(channels),
            Arc::new(RendererRegistry::new()),
        )
    }

    fn forum_reply() -> NotificationMessage {
        NotificationMessage::new(
            NotificationType::new("forum-reply", "basic-text"),
            json!({"subject": "有人回复了你的帖子"}),
        )
    }

    /// 没有设置任何期望的 mock：任何存储调用都会 panic
    fn untouched_store() -> MockNotificationStore {
        MockNotificationStore::new()
    }

    #[tokio::test]
    async fn test_register_type_registers_renderer() {
        let mut store = MockNotificationStore::new();
        store
            .expect_save_notification_type()
            .withf(|t| t.name == "forum-reply")
            .times(2)
            .returning(|_| Ok(()));

        let publisher = publisher_with(store);
        let msg_type = NotificationType::new("forum-reply", "basic-text");
        publisher.register_notification_type(&msg_type).await.unwrap();
        publisher.register_notification_type(&msg_type).await.unwrap();

        assert_eq!(publisher.renderers().renderers(), vec!["basic-text"]);
    }

    #[tokio::test]
    async fn test_register_invalid_type_has_no_side_effects() {
        let publisher = publisher_with(untouched_store());
        let result = publisher
            .register_notification_type(&NotificationType::new("", "basic-text"))
            .await;

        assert!(matches!(result, Err(PublisherError::Validation(_))));
        assert!(publisher.renderers().is_empty());
    }

    fn seed(name: &str, renderer: &str) -> NotificationTypeSeed {
        NotificationTypeSeed {
            name: name.to_string(),
            renderer: renderer.to_string(),
        }
    }

    #[tokio::test]
    async fn test_seed_registration_stops_at_first_failure() {
        let mut store = MockNotificationStore::new();
        store
            .expect_save_notification_type()
            .withf(|t| t.name == "forum-reply")
            .times(1)
            .returning(|_| Ok(()));

        let publisher = publisher_with(store);
        let seeds = vec![
            seed("forum-reply", "basic-text"),
            seed("", "basic-text"),
            seed("course-update", "rich-html"),
        ];

        let result = publisher.register_seed_types(&seeds).await;
        assert!(matches!(result, Err(PublisherError::Validation(_))));
        assert_eq!(publisher.renderers().renderers(), vec!["basic-text"]);
    }

    #[tokio::test]
    async fn test_seed_registration_propagates_store_error() {
        let mut store = MockNotificationStore::new();
        store
            .expect_save_notification_type()
            .times(1)
            .returning(|_| Err(PublisherError::Store("连接被拒绝".to_string())));

        let publisher = publisher_with(store);
        let result = publisher
            .register_seed_types(&[seed("forum-reply", "basic-text")])
            .await;
        assert!(matches!(result, Err(PublisherError::Store(_))));
    }

    #[tokio::test]
    async fn test_get_unknown_type_not_found() {
        let mut store = MockNotificationStore::new();
        store
            .expect_get_notification_type()
            .returning(|_| Ok(None));

        let publisher = publisher_with(store);
        let err = publisher.get_notification_type("missing").await.unwrap_err();
        assert!(matches!(err, PublisherError::NotificationTypeNotFound(name) if name == "missing"));
    }

    #[tokio::test]
    async fn test_invalid_message_rejected_before_store() {
        let publisher = publisher_with(untouched_store());
        let mut msg = forum_reply();
        msg.msg_type.name = String::new();

        let result = publisher.publish_notification_to_user(42, &msg).await;
        assert!(matches!(result, Err(PublisherError::Validation(_))));

        let result = publisher
            .bulk_publish_notification_to_users(Recipients::list(vec![1, 2, 3]), &msg)
            .await;
        assert!(matches!(result, Err(PublisherError::Validation(_))));
    }

    #[tokio::test]
    async fn test_non_positive_user_id_rejected() {
        let publisher = publisher_with(untouched_store());
        for user_id in [0, -5] {
            let result = publisher
                .publish_notification_to_user(user_id, &forum_reply())
                .await;
            assert!(matches!(result, Err(PublisherError::Validation(_))));
        }
        assert!(publisher.get_unread_count(0).await.is_err());
    }

    #[tokio::test]
    async fn test_bulk_scalar_input_rejected_before_store() {
        let publisher = publisher_with(untouched_store());
        let err = publisher
            .bulk_publish_notification_to_users(json!(42), &forum_reply())
            .await
            .unwrap_err();

        match err {
            PublisherError::UnsupportedInput { type_name } => assert_eq!(type_name, "number"),
            other => panic!("期望 UnsupportedInput，实际: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unresolvable_channel_fails_before_store() {
        let publisher = NotificationPublisher::new(
            Arc::new(untouched_store()),
            Arc::new(ChannelRegistry::new()),
            Arc::new(RendererRegistry::new()),
        );

        let result = publisher
            .publish_notification_to_user(42, &forum_reply())
            .await;
        assert!(matches!(
            result,
            Err(PublisherError::ChannelResolution { user_id: Some(42), .. })
        ));

        let result = publisher
            .bulk_publish_notification_to_users(vec![1_i64], &forum_reply())
            .await;
        assert!(matches!(
            result,
            Err(PublisherError::ChannelResolution { user_id: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_unread_count_reads_through() {
        let mut store = MockNotificationStore::new();
        store
            .expect_count_user_notifications()
            .withf(|user_id, unread_only| *user_id == 42 && *unread_only)
            .times(1)
            .returning(|_, _| Ok(3));

        let publisher = publisher_with(store);
        assert_eq!(publisher.get_unread_count(42).await.unwrap(), 3);
    }
}
