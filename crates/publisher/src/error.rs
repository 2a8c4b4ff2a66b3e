//! 通知发布错误类型
//!
//! 定义发布层的业务错误和系统错误。校验类错误一律在任何存储写入之前抛出，
//! 存储错误原样向上传播，不在本层重试或吞掉。

use thiserror::Error;

use crate::models::UserId;

/// 通知发布错误类型
#[derive(Debug, Error)]
pub enum PublisherError {
    // === 输入校验错误 ===
    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("批量发布的接收者参数类型不受支持: {type_name}，仅接受列表、惰性迭代器或结果游标")]
    UnsupportedInput { type_name: String },

    // === 查询错误 ===
    #[error("通知类型不存在: {0}")]
    NotificationTypeNotFound(String),

    // === 渠道错误 ===
    #[error("无法确定通知渠道: user_id={user_id:?}, msg_type={msg_type}")]
    ChannelResolution {
        user_id: Option<UserId>,
        msg_type: String,
    },

    // === 批量分发中断 ===
    /// 消息已持久化、部分批次已写入后发生的错误，`flushed` 为已落库的接收者数
    #[error("批量分发中断: 已写入 {flushed} 个接收者, 原因: {source}")]
    PartialDispatch {
        flushed: usize,
        #[source]
        source: Box<PublisherError>,
    },

    // === 系统错误 ===
    #[error("存储错误: {0}")]
    Store(String),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON 序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Shared(#[from] notification_shared::error::SharedError),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 通知发布 Result 类型别名
pub type Result<T> = std::result::Result<T, PublisherError>;

impl PublisherError {
    /// 检查是否为可重试的错误
    ///
    /// 批量分发中断是否可重试取决于底层错误；注意重试会为已写入的接收者产生重复记录
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(_) => true,
            Self::Shared(e) => e.is_retryable(),
            Self::PartialDispatch { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::UnsupportedInput { .. }
                | Self::NotificationTypeNotFound(_)
                | Self::ChannelResolution { .. }
        )
    }

    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::UnsupportedInput { .. } => "UNSUPPORTED_INPUT",
            Self::NotificationTypeNotFound(_) => "NOTIFICATION_TYPE_NOT_FOUND",
            Self::ChannelResolution { .. } => "CHANNEL_RESOLUTION_FAILED",
            Self::PartialDispatch { .. } => "PARTIAL_DISPATCH",
            Self::Store(_) => "STORE_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Shared(e) => e.code(),
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 已写入存储的接收者数（仅批量分发中断时有值）
    pub fn flushed_count(&self) -> Option<usize> {
        match self {
            Self::PartialDispatch { flushed, .. } => Some(*flushed),
            _ => None,
        }
    }
}

/// 无法失败的转换（例如 `Vec<UserId>` 到 `Recipients`）
impl From<std::convert::Infallible> for PublisherError {
    fn from(never: std::convert::Infallible) -> Self {
        match never {}
    }
}

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for PublisherError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}
