//! 批量发布的接收者集合
//!
//! 接收者是一个有限、单次消费、保持原始顺序的用户 ID 序列。支持三种来源：
//! 具体列表、惰性迭代器、以及外部数据源的结果游标（异步流）。
//! 弱类型输入（JSON）必须经过 `TryFrom<serde_json::Value>` 显式转换，
//! 不受支持的形状在任何存储调用之前被拒绝。

use std::fmt;

use futures::stream::{self, BoxStream, Stream, StreamExt};

use super::UserId;
use super::message::json_type_name;
use crate::error::{PublisherError, Result};

/// 批量发布的接收者
pub enum Recipients {
    /// 具体列表
    List(Vec<UserId>),
    /// 惰性迭代器，只能遍历一次
    Lazy(Box<dyn Iterator<Item = UserId> + Send>),
    /// 结果游标，单项错误会中止分发
    Cursor(BoxStream<'static, Result<UserId>>),
}

impl Recipients {
    pub fn list(user_ids: Vec<UserId>) -> Self {
        Self::List(user_ids)
    }

    pub fn lazy<I>(user_ids: I) -> Self
    where
        I: IntoIterator<Item = UserId>,
        I::IntoIter: Send + 'static,
    {
        Self::Lazy(Box::new(user_ids.into_iter()))
    }

    /// 包装外部游标，例如 sqlx 的 `fetch` 流
    pub fn cursor<S, E>(rows: S) -> Self
    where
        S: Stream<Item = std::result::Result<UserId, E>> + Send + 'static,
        E: Into<PublisherError> + 'static,
    {
        Self::Cursor(rows.map(|row| row.map_err(Into::into)).boxed())
    }

    /// 来源类型名，用于日志
    pub fn kind(&self) -> &'static str {
        match self {
            Self::List(_) => "list",
            Self::Lazy(_) => "lazy",
            Self::Cursor(_) => "cursor",
        }
    }

    /// 已知的接收者数量（仅列表可确定）
    pub fn known_len(&self) -> Option<usize> {
        match self {
            Self::List(ids) => Some(ids.len()),
            Self::Lazy(iter) => match iter.size_hint() {
                (lower, Some(upper)) if lower == upper => Some(lower),
                _ => None,
            },
            Self::Cursor(_) => None,
        }
    }

    /// 转为统一的异步流，按原始顺序逐个产出
    pub fn into_stream(self) -> BoxStream<'static, Result<UserId>> {
        match self {
            Self::List(ids) => stream::iter(ids.into_iter().map(Ok)).boxed(),
            Self::Lazy(iter) => stream::iter(iter.map(Ok)).boxed(),
            Self::Cursor(rows) => rows,
        }
    }
}

impl From<Vec<UserId>> for Recipients {
    fn from(user_ids: Vec<UserId>) -> Self {
        Self::List(user_ids)
    }
}

/// 弱类型输入的类型检查闸门
///
/// 只接受整数数组；其余 JSON 形状（数字、字符串、对象、布尔、null）
/// 以及数组中的非整数元素都返回 `UnsupportedInput`
impl TryFrom<serde_json::Value> for Recipients {
    type Error = PublisherError;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Array(items) => {
                let mut user_ids = Vec::with_capacity(items.len());
                for item in &items {
                    let user_id = item.as_i64().ok_or_else(|| PublisherError::UnsupportedInput {
                        type_name: format!("array<{}>", json_type_name(item)),
                    })?;
                    user_ids.push(user_id);
                }
                Ok(Self::List(user_ids))
            }
            other => Err(PublisherError::UnsupportedInput {
                type_name: json_type_name(&other).to_string(),
            }),
        }
    }
}

impl fmt::Debug for Recipients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List(ids) => f.debug_tuple("List").field(&ids.len()).finish(),
            Self::Lazy(_) => f.write_str("Lazy(..)"),
            Self::Cursor(_) => f.write_str("Cursor(..)"),
        }
    }
}
