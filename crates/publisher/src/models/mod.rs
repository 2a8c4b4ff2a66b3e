//! 领域模型定义

mod message;
mod notification_type;
mod recipients;
mod user_notification;

pub use message::NotificationMessage;
pub use notification_type::NotificationType;
pub use recipients::Recipients;
pub use user_notification::UserNotification;

/// 用户标识，由调用方提供，本层不校验用户是否存在
pub type UserId = i64;
