//! 内存通知存储
//!
//! 用于测试和本地开发。外键约束与 PostgreSQL 实现一致：
//! 消息引用的类型必须已注册，记录引用的消息必须已保存。

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use super::NotificationStore;
use crate::error::{PublisherError, Result};
use crate::models::{NotificationMessage, NotificationType, UserId, UserNotification};

/// 内存通知存储
#[derive(Default)]
pub struct InMemoryNotificationStore {
    types: RwLock<BTreeMap<String, NotificationType>>,
    messages: RwLock<HashMap<i64, NotificationMessage>>,
    records: RwLock<Vec<UserNotification>>,
    next_msg_id: AtomicI64,
    next_record_id: AtomicI64,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前所有用户通知记录（按写入顺序）
    pub fn user_notifications(&self) -> Vec<UserNotification> {
        self.records.read().clone()
    }

    /// 当前消息数
    pub fn message_count(&self) -> usize {
        self.messages.read().len()
    }

    fn check_msg_exists(&self, msg_id: i64) -> Result<()> {
        if self.messages.read().contains_key(&msg_id) {
            Ok(())
        } else {
            Err(PublisherError::Store(format!(
                "用户通知记录引用了不存在的消息: msg_id={}",
                msg_id
            )))
        }
    }

    fn assign_record_id(&self, record: &UserNotification) -> UserNotification {
        let mut saved = record.clone();
        saved.id = Some(self.next_record_id.fetch_add(1, Ordering::SeqCst) + 1);
        saved
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn save_notification_type(&self, msg_type: &NotificationType) -> Result<()> {
        self.types
            .write()
            .insert(msg_type.name.clone(), msg_type.clone());
        Ok(())
    }

    async fn get_notification_type(&self, name: &str) -> Result<Option<NotificationType>> {
        Ok(self.types.read().get(name).cloned())
    }

    async fn get_all_notification_types(&self) -> Result<Vec<NotificationType>> {
        Ok(self.types.read().values().cloned().collect())
    }

    async fn save_notification_message(
        &self,
        msg: &NotificationMessage,
    ) -> Result<NotificationMessage> {
        if !self.types.read().contains_key(&msg.msg_type.name) {
            return Err(PublisherError::Store(format!(
                "消息引用了未注册的通知类型: {}",
                msg.msg_type.name
            )));
        }

        let mut saved = msg.clone();
        let id = self.next_msg_id.fetch_add(1, Ordering::SeqCst) + 1;
        saved.id = Some(id);
        saved.created = Some(Utc::now());

        self.messages.write().insert(id, saved.clone());
        Ok(saved)
    }

    async fn get_notification_message(&self, id: i64) -> Result<Option<NotificationMessage>> {
        Ok(self.messages.read().get(&id).cloned())
    }

    async fn save_user_notification(
        &self,
        record: &UserNotification,
    ) -> Result<UserNotification> {
        self.check_msg_exists(record.msg_id)?;

        let saved = self.assign_record_id(record);
        self.records.write().push(saved.clone());
        Ok(saved)
    }

    /// 先校验整批，再一次性追加
    async fn bulk_create_user_notifications(&self, records: &[UserNotification]) -> Result<()> {
        for record in records {
            self.check_msg_exists(record.msg_id)?;
        }

        let saved: Vec<UserNotification> =
            records.iter().map(|r| self.assign_record_id(r)).collect();
        self.records.write().extend(saved);
        Ok(())
    }

    async fn count_user_notifications(&self, user_id: UserId, unread_only: bool) -> Result<i64> {
        let count = self
            .records
            .read()
            .iter()
            .filter(|r| r.user_id == user_id && (!unread_only || r.is_unread()))
            .count();
        Ok(count as i64)
    }
}
