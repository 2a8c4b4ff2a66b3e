//! 通知库连接管理
//!
//! 连接池创建、迁移与表结构自检。发布服务启动时只需调用
//! [`Database::connect_and_migrate`]，存储层通过 [`Database::pool`] 取得连接池。

use crate::config::DatabaseConfig;
use crate::error::{Result, SharedError};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

/// 通知存储依赖的表
pub const NOTIFICATION_TABLES: [&str; 3] =
    ["notification_types", "notification_messages", "user_notifications"];

/// 通知库连接池
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    #[instrument(skip(config), fields(max_connections = config.max_connections))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await?;

        info!("通知库连接池已创建");
        Ok(Self { pool })
    }

    /// 连接、执行迁移并确认通知表齐全
    pub async fn connect_and_migrate(config: &DatabaseConfig) -> Result<Self> {
        let db = Self::connect(config).await?;
        db.run_migrations().await?;
        db.verify_schema().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 迁移脚本位于仓库根目录的 migrations/，编译期嵌入二进制
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("通知库迁移已执行");
        Ok(())
    }

    /// 检查通知表是否都存在，缺失时返回带表名的错误
    pub async fn verify_schema(&self) -> Result<()> {
        let present: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = current_schema() AND table_name = ANY($1)
            "#,
        )
        .bind(&NOTIFICATION_TABLES[..])
        .fetch_all(&self.pool)
        .await?;

        let missing: Vec<&str> = NOTIFICATION_TABLES
            .iter()
            .copied()
            .filter(|table| !present.iter().any(|p| p == table))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SharedError::Internal(format!(
                "缺少通知表: {}",
                missing.join(", ")
            )))
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("通知库连接池已关闭");
    }
}
