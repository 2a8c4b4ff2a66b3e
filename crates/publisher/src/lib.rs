//! 通知发布与扇出
//!
//! 接收发往单个用户或大量用户的通知消息，先持久化消息体，
//! 再通过可插拔的渠道为每个接收者生成一条投递记录。
//!
//! ## 核心功能
//!
//! - **类型注册**：注册通知类型并登记其渲染器
//! - **单用户发布**：一次消息写入 + 一次记录写入
//! - **批量发布**：消息只写一次，接收者按固定批次大小分块写入
//! - **渠道解析**：按用户偏好、类型路由、默认渠道依次解析
//!
//! ## 模块结构
//!
//! - `models`: 领域模型定义
//! - `error`: 错误类型定义
//! - `store`: 存储接口及 PostgreSQL / 内存实现
//! - `channel`: 通知渠道、渠道注册表、分发事件
//! - `renderer`: 渲染器注册表
//! - `publisher`: 对外发布 API

pub mod channel;
pub mod error;
pub mod models;
pub mod publisher;
pub mod renderer;
pub mod store;

pub use channel::{
    ChannelPreferences, ChannelRegistry, DispatchEvent, DispatchSink, DurableChannel,
    KafkaDispatchSink, MAX_BULK_USER_NOTIFICATION_SIZE, NoChannelPreferences, NotificationChannel,
};
pub use error::{PublisherError, Result};
pub use models::*;
pub use publisher::NotificationPublisher;
pub use renderer::RendererRegistry;
pub use store::{InMemoryNotificationStore, NotificationStore, PgNotificationStore};
