//! 渠道注册表
//!
//! 按名称管理渠道实例，并根据 (用户, 通知类型) 解析出具体渠道。
//!
//! ## 解析顺序
//!
//! 1. 用户偏好（仅在给定用户且偏好的渠道已注册时生效）
//! 2. 通知类型路由
//! 3. 默认渠道
//! 4. 以上都没有命中时返回 `ChannelResolution` 错误，不会返回空渠道
//!
//! 批量发布不绑定具体用户，解析时传 `None`，因此跳过用户偏好。

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use notification_shared::config::ChannelRoutingConfig;

use super::NotificationChannel;
use crate::error::{PublisherError, Result};
use crate::models::UserId;

/// 用户渠道偏好
///
/// 返回偏好的渠道名；None 表示没有偏好，交给路由表处理
pub trait ChannelPreferences: Send + Sync {
    fn preferred_channel(&self, user_id: UserId, msg_type: &str) -> Option<String>;
}

/// 不做任何偏好解析
#[derive(Debug, Clone, Copy, Default)]
pub struct NoChannelPreferences;

impl ChannelPreferences for NoChannelPreferences {
    fn preferred_channel(&self, _user_id: UserId, _msg_type: &str) -> Option<String> {
        None
    }
}

/// 渠道注册表
pub struct ChannelRegistry {
    channels: HashMap<String, Arc<dyn NotificationChannel>>,
    routes: HashMap<String, String>,
    default_channel: Option<String>,
    preferences: Arc<dyn ChannelPreferences>,
}

impl ChannelRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
            routes: HashMap::new(),
            default_channel: None,
            preferences: Arc::new(NoChannelPreferences),
        }
    }

    /// 注册一个渠道，同名渠道会被替换
    pub fn register(&mut self, channel: Arc<dyn NotificationChannel>) -> &mut Self {
        let name = channel.name().to_string();
        debug!(channel = %name, "注册通知渠道");
        self.channels.insert(name, channel);
        self
    }

    /// 为通知类型指定渠道，渠道必须已注册
    pub fn set_route(
        &mut self,
        msg_type: impl Into<String>,
        channel_name: impl Into<String>,
    ) -> Result<&mut Self> {
        let channel_name = self.ensure_registered(channel_name.into())?;
        self.routes.insert(msg_type.into(), channel_name);
        Ok(self)
    }

    /// 设置默认渠道（对应路由表中的 `*`），渠道必须已注册
    pub fn set_default(&mut self, channel_name: impl Into<String>) -> Result<&mut Self> {
        let channel_name = self.ensure_registered(channel_name.into())?;
        self.default_channel = Some(channel_name);
        Ok(self)
    }

    pub fn with_preferences(mut self, preferences: Arc<dyn ChannelPreferences>) -> Self {
        self.preferences = preferences;
        self
    }

    /// 根据路由配置创建注册表
    ///
    /// 路由或默认值引用了未注册的渠道时返回校验错误
    pub fn from_config(
        channels: Vec<Arc<dyn NotificationChannel>>,
        config: &ChannelRoutingConfig,
    ) -> Result<Self> {
        let mut registry = Self::new();
        for channel in channels {
            registry.register(channel);
        }

        if let Some(default) = &config.default {
            registry.set_default(default.as_str())?;
        }
        for (msg_type, channel_name) in &config.routes {
            registry.set_route(msg_type.as_str(), channel_name.as_str())?;
        }

        info!(
            channels = ?registry.channel_names(),
            routes = registry.routes.len(),
            default = ?registry.default_channel,
            "渠道注册表初始化完成"
        );

        Ok(registry)
    }

    /// 解析 (用户, 通知类型) 对应的渠道
    pub fn get_notification_channel(
        &self,
        user_id: Option<UserId>,
        msg_type: &str,
    ) -> Result<Arc<dyn NotificationChannel>> {
        if let Some(user_id) = user_id
            && let Some(preferred) = self.preferences.preferred_channel(user_id, msg_type)
            && let Some(channel) = self.channels.get(&preferred)
        {
            return Ok(channel.clone());
        }

        self.routes
            .get(msg_type)
            .or(self.default_channel.as_ref())
            .and_then(|name| self.channels.get(name))
            .cloned()
            .ok_or_else(|| PublisherError::ChannelResolution {
                user_id,
                msg_type: msg_type.to_string(),
            })
    }

    /// 获取指定名称的渠道
    pub fn get(&self, name: &str) -> Option<Arc<dyn NotificationChannel>> {
        self.channels.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    /// 已注册的渠道名（按名称排序）
    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    fn ensure_registered(&self, channel_name: String) -> Result<String> {
        if self.channels.contains_key(&channel_name) {
            Ok(channel_name)
        } else {
            Err(PublisherError::Validation(format!(
                "渠道未注册: {}",
                channel_name
            )))
        }
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
