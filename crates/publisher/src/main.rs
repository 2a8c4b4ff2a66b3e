//! 通知发布服务
//!
//! 启动流程：加载配置、初始化可观测性、连接数据库并执行迁移、
//! 组装存储/渠道/注册表/发布者，并预注册配置中的通知类型。

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use notification_shared::{
    config::AppConfig, database::Database, kafka::KafkaProducer, observability,
};

use notification_publisher::{
    ChannelRegistry, DispatchSink, DurableChannel, KafkaDispatchSink, NotificationChannel,
    NotificationPublisher, NotificationStore, PgNotificationStore,
    RendererRegistry,
};

const SERVICE_NAME: &str = "notification-publisher";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载配置
    let config = AppConfig::load(SERVICE_NAME)?;

    // 2. 初始化可观测性
    observability::init(&config.service_name, &config.observability)?;

    info!("Starting {}...", SERVICE_NAME);
    info!(
        environment = %config.environment,
        max_bulk_batch_size = config.dispatch.max_bulk_batch_size,
        push_enabled = config.dispatch.push_enabled,
        "Configuration loaded"
    );

    // 3. 连接数据库并执行迁移
    let db = Database::connect_and_migrate(&config.database).await?;
    info!("Database connection established");

    // 4. 组装存储与渠道
    let store: Arc<dyn NotificationStore> = Arc::new(PgNotificationStore::new(db.pool().clone()));

    let sink: Option<Arc<dyn DispatchSink>> = if config.dispatch.push_enabled {
        let producer = KafkaProducer::new(&config.kafka)?;
        Some(Arc::new(KafkaDispatchSink::with_topic(
            producer,
            config.dispatch.push_topic.clone(),
        )))
    } else {
        None
    };

    let durable: Arc<dyn NotificationChannel> = Arc::new(DurableChannel::from_config(
        store.clone(),
        &config.dispatch,
        sink,
    ));
    let channels = ChannelRegistry::from_config(vec![durable], &config.channels)?;

    let publisher = NotificationPublisher::new(
        store,
        Arc::new(channels),
        Arc::new(RendererRegistry::new()),
    );
    info!("Notification publisher initialized");

    // 5. 预注册通知类型，任一失败即终止启动
    publisher
        .register_seed_types(&config.notification_types)
        .await
        .context("预注册通知类型失败")?;

    let types = publisher.get_all_notification_types().await?;
    info!(
        notification_types = types.len(),
        renderers = ?publisher.renderers().renderers(),
        "Notification types registered"
    );

    db.close().await;
    info!("{} shutdown complete", SERVICE_NAME);

    Ok(())
}
