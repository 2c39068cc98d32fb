//! 全局入口注册表
//!
//! 进程级状态，必须先显式调用 [`init`]。用户在这里注册自定义的全局浏览入口
//! 和按内容类型的查看器；编辑核心从不读写这里。

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::runtime::ObjectId;
use crate::utils::InspectorError;

/// 按内容类型渲染数据的查看器工厂
pub type ContentViewerFactory = Arc<dyn Fn(&[u8]) -> String + Send + Sync>;

/// 全局入口的行为
#[derive(Clone)]
pub enum GlobalEntryAction {
    /// 打开一个对象
    Object(ObjectId),
    /// 执行自定义动作
    Action(Arc<dyn Fn() + Send + Sync>),
}

#[derive(Clone)]
pub struct GlobalEntry {
    pub title: String,
    pub action: GlobalEntryAction,
}

impl GlobalEntry {
    pub fn object(title: impl Into<String>, object: ObjectId) -> Self {
        Self { title: title.into(), action: GlobalEntryAction::Object(object) }
    }

    pub fn action(title: impl Into<String>, action: impl Fn() + Send + Sync + 'static) -> Self {
        Self { title: title.into(), action: GlobalEntryAction::Action(Arc::new(action)) }
    }
}

impl fmt::Debug for GlobalEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match &self.action {
            GlobalEntryAction::Object(object) => object.to_string(),
            GlobalEntryAction::Action(_) => "<action>".to_string(),
        };
        f.debug_struct("GlobalEntry").field("title", &self.title).field("action", &action).finish()
    }
}

/// 注册表内容
#[derive(Default)]
pub struct GlobalRegistry {
    entries: Vec<GlobalEntry>,
    viewers: HashMap<String, ContentViewerFactory>,
}

impl GlobalRegistry {
    pub fn register_global_entry(&mut self, entry: GlobalEntry) {
        tracing::debug!(title = %entry.title, "registered global entry");
        self.entries.push(entry);
    }

    /// 设置内容类型的查看器，返回是否替换了已有查看器
    pub fn set_custom_viewer(&mut self, content_type: &str, factory: ContentViewerFactory) -> bool {
        self.viewers.insert(content_type.to_ascii_lowercase(), factory).is_some()
    }

    /// 按注册顺序
    pub fn user_global_entries(&self) -> &[GlobalEntry] {
        &self.entries
    }

    /// 内容类型不区分大小写
    pub fn custom_viewer(&self, content_type: &str) -> Option<ContentViewerFactory> {
        self.viewers.get(&content_type.to_ascii_lowercase()).cloned()
    }

    pub fn content_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.viewers.keys().cloned().collect();
        types.sort();
        types
    }
}

impl fmt::Debug for GlobalRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalRegistry")
            .field("entries", &self.entries)
            .field("viewers", &self.content_types())
            .finish()
    }
}

static REGISTRY: OnceLock<RwLock<GlobalRegistry>> = OnceLock::new();

/// 初始化进程级注册表；已初始化时返回 false
pub fn init() -> bool {
    let mut created = false;
    REGISTRY.get_or_init(|| {
        created = true;
        RwLock::new(GlobalRegistry::default())
    });
    created
}

/// 已初始化的注册表
pub fn registry() -> Result<&'static RwLock<GlobalRegistry>, InspectorError> {
    REGISTRY.get().ok_or(InspectorError::RegistryUninitialized)
}

pub fn register_global_entry(entry: GlobalEntry) -> Result<(), InspectorError> {
    registry()?.write().register_global_entry(entry);
    Ok(())
}

pub fn set_custom_viewer(content_type: &str, factory: ContentViewerFactory) -> Result<bool, InspectorError> {
    Ok(registry()?.write().set_custom_viewer(content_type, factory))
}
