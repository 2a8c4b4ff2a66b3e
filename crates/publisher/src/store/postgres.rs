//! PostgreSQL 通知存储
//!
//! 使用 SQLx 进行数据库操作。批量创建使用单条 UNNEST 数组 INSERT，
//! 一个批次要么全部写入、要么全部失败；之前已提交的批次不会回滚。
//! 绑定参数个数不随批次增长，不受协议 65535 个参数的上限约束。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use super::NotificationStore;
use crate::error::Result;
use crate::models::{NotificationMessage, NotificationType, UserId, UserNotification};

/// 消息表与类型表联查的结果行
#[derive(sqlx::FromRow)]
struct MessageRow {
    id: i64,
    msg_type: String,
    renderer: String,
    namespace: Option<String>,
    from_user_id: Option<i64>,
    payload: serde_json::Value,
    priority: i32,
    deliver_no_earlier_than: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<MessageRow> for NotificationMessage {
    fn from(row: MessageRow) -> Self {
        Self {
            id: Some(row.id),
            msg_type: NotificationType::new(row.msg_type, row.renderer),
            namespace: row.namespace,
            from_user_id: row.from_user_id,
            payload: row.payload,
            priority: row.priority,
            created: Some(row.created_at),
            deliver_no_earlier_than: row.deliver_no_earlier_than,
            expires_at: row.expires_at,
        }
    }
}

/// PostgreSQL 通知存储
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    // ==================== 通知类型 ====================

    /// 同名类型覆盖 renderer（最后一次写入生效）
    #[instrument(skip(self, msg_type), fields(name = %msg_type.name))]
    async fn save_notification_type(&self, msg_type: &NotificationType) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_types (name, renderer)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE
            SET renderer = EXCLUDED.renderer, updated_at = NOW()
            "#,
        )
        .bind(&msg_type.name)
        .bind(&msg_type.renderer)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_notification_type(&self, name: &str) -> Result<Option<NotificationType>> {
        let msg_type = sqlx::query_as::<_, NotificationType>(
            r#"
            SELECT name, renderer
            FROM notification_types
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(msg_type)
    }

    async fn get_all_notification_types(&self) -> Result<Vec<NotificationType>> {
        let types = sqlx::query_as::<_, NotificationType>(
            r#"
            SELECT name, renderer
            FROM notification_types
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(types)
    }

    // ==================== 消息体 ====================

    #[instrument(skip(self, msg), fields(msg_type = %msg.msg_type.name))]
    async fn save_notification_message(
        &self,
        msg: &NotificationMessage,
    ) -> Result<NotificationMessage> {
        let row = sqlx::query(
            r#"
            INSERT INTO notification_messages
                (msg_type, namespace, from_user_id, payload, priority,
                 deliver_no_earlier_than, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, created_at
            "#,
        )
        .bind(&msg.msg_type.name)
        .bind(&msg.namespace)
        .bind(msg.from_user_id)
        .bind(&msg.payload)
        .bind(msg.priority)
        .bind(msg.deliver_no_earlier_than)
        .bind(msg.expires_at)
        .fetch_one(&self.pool)
        .await?;

        let mut saved = msg.clone();
        saved.id = Some(row.try_get("id")?);
        saved.created = Some(row.try_get("created_at")?);

        debug!(msg_id = ?saved.id, "通知消息已保存");
        Ok(saved)
    }

    async fn get_notification_message(&self, id: i64) -> Result<Option<NotificationMessage>> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT m.id, m.msg_type, t.renderer, m.namespace, m.from_user_id, m.payload,
                   m.priority, m.deliver_no_earlier_than, m.expires_at, m.created_at
            FROM notification_messages m
            JOIN notification_types t ON t.name = m.msg_type
            WHERE m.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(NotificationMessage::from))
    }

    // ==================== 用户通知记录 ====================

    #[instrument(skip(self, record), fields(user_id = record.user_id, msg_id = record.msg_id))]
    async fn save_user_notification(
        &self,
        record: &UserNotification,
    ) -> Result<UserNotification> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO user_notifications (user_id, msg_id, read_at, user_context, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(record.user_id)
        .bind(record.msg_id)
        .bind(record.read_at)
        .bind(&record.user_context)
        .bind(record.created)
        .fetch_one(&self.pool)
        .await?;

        let mut saved = record.clone();
        saved.id = Some(id);
        Ok(saved)
    }

    /// UNNEST 数组插入：参数个数固定为 5，与批次大小无关，整批原子写入
    #[instrument(skip(self, records), fields(batch_size = records.len()))]
    async fn bulk_create_user_notifications(&self, records: &[UserNotification]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let user_ids: Vec<i64> = records.iter().map(|r| r.user_id).collect();
        let msg_ids: Vec<i64> = records.iter().map(|r| r.msg_id).collect();
        let read_ats: Vec<Option<DateTime<Utc>>> = records.iter().map(|r| r.read_at).collect();
        let contexts: Vec<Option<serde_json::Value>> =
            records.iter().map(|r| r.user_context.clone()).collect();
        let created: Vec<DateTime<Utc>> = records.iter().map(|r| r.created).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO user_notifications (user_id, msg_id, read_at, user_context, created_at)
            SELECT * FROM UNNEST($1::bigint[], $2::bigint[], $3::timestamptz[], $4::jsonb[], $5::timestamptz[])
            "#,
        )
        .bind(&user_ids)
        .bind(&msg_ids)
        .bind(&read_ats)
        .bind(&contexts)
        .bind(&created)
        .execute(&self.pool)
        .await?;

        debug!(rows = result.rows_affected(), "批量写入用户通知记录");
        Ok(())
    }

    async fn count_user_notifications(&self, user_id: UserId, unread_only: bool) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM user_notifications
            WHERE user_id = $1 AND ($2 = FALSE OR read_at IS NULL)
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
