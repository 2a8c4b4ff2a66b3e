//! PostgreSQL 存储集成测试
//!
//! 需要可用的 PostgreSQL（TEST_DATABASE_URL 或 DATABASE_URL），默认忽略：
//! `cargo test -p notification-publisher --test pg_store_test -- --ignored`

use std::sync::Arc;

use serde_json::json;

use notification_publisher::{
    ChannelRegistry, DurableChannel, NotificationMessage, NotificationPublisher,
    NotificationChannel, NotificationStore, NotificationType, PgNotificationStore, Recipients,
    RendererRegistry, UserNotification,
};
use notification_shared::database::Database;
use notification_shared::test_utils::{test_database_config, test_type_name, test_user_id};

async fn setup() -> (Database, Arc<PgNotificationStore>) {
    let db = Database::connect_and_migrate(&test_database_config())
        .await
        .expect("连接测试数据库并执行迁移失败");
    let store = Arc::new(PgNotificationStore::new(db.pool().clone()));
    (db, store)
}

async fn registered_type(store: &PgNotificationStore) -> NotificationType {
    let msg_type = NotificationType::new(test_type_name("forum-reply"), "basic-text");
    store.save_notification_type(&msg_type).await.unwrap();
    msg_type
}

#[tokio::test]
#[ignore = "需要 PostgreSQL 数据库连接"]
async fn test_type_upsert_last_write_wins() {
    let (db, store) = setup().await;
    let msg_type = registered_type(&store).await;

    let updated = NotificationType::new(msg_type.name.clone(), "rich-html");
    store.save_notification_type(&updated).await.unwrap();

    let loaded = store
        .get_notification_type(&msg_type.name)
        .await
        .unwrap()
        .expect("类型已保存");
    assert_eq!(loaded.renderer, "rich-html");
    assert!(store.get_notification_type("no-such-type").await.unwrap().is_none());

    db.close().await;
}

#[tokio::test]
#[ignore = "需要 PostgreSQL 数据库连接"]
async fn test_message_roundtrip_and_bulk_insert() {
    let (db, store) = setup().await;
    let msg_type = registered_type(&store).await;

    let msg = store
        .save_notification_message(
            &NotificationMessage::new(msg_type.clone(), json!({"subject": "hi"}))
                .with_namespace("course-101")
                .with_priority(3),
        )
        .await
        .unwrap();
    let msg_id = msg.id.expect("存储分配了 ID");

    let loaded = store
        .get_notification_message(msg_id)
        .await
        .unwrap()
        .expect("消息已保存");
    assert_eq!(loaded.msg_type, msg_type);
    assert_eq!(loaded.payload, json!({"subject": "hi"}));
    assert_eq!(loaded.priority, 3);

    let user_a = test_user_id();
    let user_b = test_user_id();
    let records = vec![
        UserNotification::new(user_a, &msg).unwrap(),
        UserNotification::new(user_b, &msg).unwrap(),
        UserNotification::new(user_a, &msg).unwrap(),
    ];
    store.bulk_create_user_notifications(&records).await.unwrap();
    store.bulk_create_user_notifications(&[]).await.unwrap();

    assert_eq!(store.count_user_notifications(user_a, true).await.unwrap(), 2);
    assert_eq!(store.count_user_notifications(user_b, false).await.unwrap(), 1);

    db.close().await;
}

#[tokio::test]
#[ignore = "需要 PostgreSQL 数据库连接"]
async fn test_bulk_insert_is_atomic_per_batch() {
    let (db, store) = setup().await;
    let msg_type = registered_type(&store).await;
    let msg = store
        .save_notification_message(&NotificationMessage::new(msg_type, json!({"k": "v"})))
        .await
        .unwrap();

    let user_id = test_user_id();
    let mut records = vec![
        UserNotification::new(user_id, &msg).unwrap(),
        UserNotification::new(user_id, &msg).unwrap(),
    ];
    // 外键约束失败，整批不写入
    records[1].msg_id = -1;

    assert!(store.bulk_create_user_notifications(&records).await.is_err());
    assert_eq!(store.count_user_notifications(user_id, false).await.unwrap(), 0);

    db.close().await;
}

#[tokio::test]
#[ignore = "需要 PostgreSQL 数据库连接"]
async fn test_bulk_batch_beyond_bind_parameter_limit() {
    let (db, store) = setup().await;
    let msg_type = registered_type(&store).await;
    let msg = store
        .save_notification_message(&NotificationMessage::new(msg_type, json!({"k": "v"})))
        .await
        .unwrap();

    // 14000 行 × 5 列超过协议的 65535 个绑定参数
    let user_id = test_user_id();
    let mut records: Vec<UserNotification> = (0..14_000)
        .map(|_| UserNotification::new(user_id, &msg).unwrap())
        .collect();
    records[0] = records[0].clone().with_user_context(json!({"pinned": true}));
    records[1].read_at = Some(chrono::Utc::now());

    store.bulk_create_user_notifications(&records).await.unwrap();

    assert_eq!(store.count_user_notifications(user_id, false).await.unwrap(), 14_000);
    assert_eq!(store.count_user_notifications(user_id, true).await.unwrap(), 13_999);

    // 经渠道按单批 14000 分发
    let store: Arc<dyn NotificationStore> = store;
    let durable = DurableChannel::new(store.clone()).with_max_batch_size(14_000);
    let recipients: Vec<i64> = (0..14_000).map(|_| test_user_id()).collect();
    let flushed = durable
        .bulk_dispatch_notification(Recipients::list(recipients.clone()), &msg)
        .await
        .unwrap();
    assert_eq!(flushed, 14_000);
    assert_eq!(store.count_user_notifications(recipients[13_999], true).await.unwrap(), 1);

    db.close().await;
}

#[tokio::test]
#[ignore = "需要 PostgreSQL 数据库连接"]
async fn test_publish_flow_against_postgres() {
    let (db, store) = setup().await;
    let store: Arc<dyn NotificationStore> = store;

    let mut channels = ChannelRegistry::new();
    channels.register(Arc::new(
        DurableChannel::new(store.clone()).with_max_batch_size(2),
    ));
    channels.set_default(DurableChannel::NAME).unwrap();
    let publisher =
        NotificationPublisher::new(store, Arc::new(channels), Arc::new(RendererRegistry::new()));

    let msg_type = NotificationType::new(test_type_name("forum-reply"), "basic-text");
    publisher.register_notification_type(&msg_type).await.unwrap();
    let msg = NotificationMessage::new(msg_type, json!({"subject": "hello"}));

    let user_id = test_user_id();
    let record = publisher
        .publish_notification_to_user(user_id, &msg)
        .await
        .unwrap();
    assert!(record.id.is_some());
    assert!(record.is_unread());

    let recipients: Vec<i64> = (0..5).map(|_| test_user_id()).collect();
    let count = publisher
        .bulk_publish_notification_to_users(recipients.clone(), &msg)
        .await
        .unwrap();
    assert_eq!(count, 5);

    for recipient in recipients {
        assert_eq!(publisher.get_unread_count(recipient).await.unwrap(), 1);
    }

    db.close().await;
}
