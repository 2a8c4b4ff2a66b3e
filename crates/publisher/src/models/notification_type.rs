//! 通知类型模型

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::Result;

/// 通知类型
///
/// `name` 在存储中全局唯一；同名重复注册时以最后一次的 renderer 为准
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Validate, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct NotificationType {
    #[validate(length(min = 1, max = 255, message = "通知类型名称长度必须在1-255个字符之间"))]
    pub name: String,
    /// 渲染器标识，由渲染器注册表管理
    #[validate(length(min = 1, max = 255, message = "渲染器标识长度必须在1-255个字符之间"))]
    pub renderer: String,
}

impl NotificationType {
    pub fn new(name: impl Into<String>, renderer: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            renderer: renderer.into(),
        }
    }

    /// 结构校验，失败返回 `PublisherError::Validation`
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self)?;
        if self.name.trim().is_empty() {
            return Err(crate::error::PublisherError::Validation(
                "通知类型名称不能为空白".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PublisherError;

    #[test]
    fn test_valid_type() {
        let msg_type = NotificationType::new("forum-reply", "basic-text");
        assert!(msg_type.validate().is_ok());
    }

    #[test]
    fn test_empty_name_rejected() {
        let msg_type = NotificationType::new("", "basic-text");
        assert!(matches!(
            msg_type.validate(),
            Err(PublisherError::Validation(_))
        ));

        let blank = NotificationType::new("   ", "basic-text");
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_empty_renderer_rejected() {
        let msg_type = NotificationType::new("forum-reply", "");
        assert!(matches!(
            msg_type.validate(),
            Err(PublisherError::Validation(_))
        ));
    }

    #[test]
    fn test_overlong_name_rejected() {
        let msg_type = NotificationType::new("x".repeat(256), "basic-text");
        assert!(msg_type.validate().is_err());
    }
}
