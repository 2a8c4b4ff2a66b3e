//! 渲染器注册表
//!
//! 只记录通知类型引用的渲染器标识，模板查找与渲染不在本层处理。

use std::collections::BTreeSet;

use parking_lot::RwLock;
use tracing::debug;

/// 渲染器注册表
///
/// 通过 `Arc` 共享，内部使用读写锁，可在多个发布者之间并发注册。
#[derive(Debug, Default)]
pub struct RendererRegistry {
    renderers: RwLock<BTreeSet<String>>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册渲染器
    ///
    /// 首次注册返回 true；重复注册是空操作，返回 false
    pub fn register_renderer(&self, renderer_id: &str) -> bool {
        let added = self.renderers.write().insert(renderer_id.to_string());
        if added {
            debug!(renderer = %renderer_id, "注册渲染器");
        }
        added
    }

    pub fn contains(&self, renderer_id: &str) -> bool {
        self.renderers.read().contains(renderer_id)
    }

    /// 已注册的渲染器（按标识排序）
    pub fn renderers(&self) -> Vec<String> {
        self.renderers.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.renderers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        let registry = RendererRegistry::new();
        assert!(registry.is_empty());

        assert!(registry.register_renderer("basic-text"));
        assert!(!registry.register_renderer("basic-text"));
        assert!(registry.register_renderer("rich-html"));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("basic-text"));
        assert_eq!(registry.renderers(), vec!["basic-text", "rich-html"]);
    }
}
