//! 宿主运行时抽象层
//!
//! 编辑核心从不直接构造原始调用，只通过这里定义的能力接口访问目标对象：
//! - **AccessorInvoker**: 按选择子调用 getter / setter
//! - **ReferenceResolver**: 把地址重新解析为存活对象（对象引用编辑的安全边界）
//! - **ObjectRuntime**: 属性元数据与同义 getter 的发现
//!
//! `snapshot` 提供一个基于内存对象图的实现，供命令行与测试使用。

pub mod snapshot;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::encoding::TypeClassification;
use crate::utils::InvocationError;
use crate::value::{ObjectRef, Value};

pub use snapshot::{SetterHook, SnapshotRuntime};

/// 目标对象句柄（非拥有），0 表示 nil
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub usize);

impl ObjectId {
    pub const NIL: ObjectId = ObjectId(0);

    pub fn is_nil(&self) -> bool {
        self.0 == 0
    }

    pub fn address(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// 访问器标识（选择子名）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selector(String);

impl Selector {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// 属性的默认 setter：`count` -> `setCount:`
    pub fn default_setter(property_name: &str) -> Self {
        let mut chars = property_name.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        };
        Self(format!("set{}:", capitalized))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// setter 形式的选择子以冒号结尾并带一个参数
    pub fn takes_argument(&self) -> bool {
        self.0.ends_with(':')
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 运行时暴露的属性元数据（名称 + 属性字符串）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeProperty {
    pub name: String,
    /// 形如 `Tq,N,V_count` 的属性字符串
    pub attributes: String,
}

impl RuntimeProperty {
    pub fn new(name: impl Into<String>, attributes: impl Into<String>) -> Self {
        Self { name: name.into(), attributes: attributes.into() }
    }
}

/// 访问器调用能力
///
/// 所有调用都是同步的，失败必须立即返回而不是阻塞。
pub trait AccessorInvoker {
    /// 调用 getter，返回值应符合 `ty`
    fn try_invoke_getter(
        &self,
        target: ObjectId,
        getter: &Selector,
        ty: &TypeClassification,
    ) -> Result<Value, InvocationError>;

    /// 调用 setter。失败时目标的原值应保持不变
    fn try_invoke_setter(
        &self,
        target: ObjectId,
        setter: &Selector,
        ty: &TypeClassification,
        value: &Value,
    ) -> Result<(), InvocationError>;

    /// 目标当前是否存活且响应该选择子
    fn responds_to(&self, target: ObjectId, selector: &Selector) -> bool;
}

/// 引用解析能力
pub trait ReferenceResolver {
    /// 地址是否对应一个当前存活的对象
    fn resolve_object(&self, address: usize) -> Option<ObjectRef>;

    /// 对象是否为指定类（或其子类）的实例；无法确定时必须返回 false
    fn is_kind_of(&self, object: &ObjectRef, class_name: &str) -> bool;

    /// 地址是否可读（原始指针编辑使用）
    fn is_readable_address(&self, address: usize) -> bool;
}

/// 完整的宿主运行时
pub trait ObjectRuntime: AccessorInvoker + ReferenceResolver {
    fn class_name_of(&self, target: ObjectId) -> Option<String>;

    /// 按声明顺序列出目标类的属性
    fn property_list(&self, target: ObjectId) -> Result<Vec<RuntimeProperty>, InvocationError>;

    /// 与属性 getter 读取同一底层值的其他 getter（不含属性自身的 getter）
    fn getter_synonyms(&self, _target: ObjectId, _property: &str) -> Vec<Selector> {
        Vec::new()
    }
}

impl fmt::Debug for dyn ObjectRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRuntime").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_setter() {
        assert_eq!(Selector::default_setter("count"), Selector::new("setCount:"));
        assert_eq!(Selector::default_setter("URL"), Selector::new("setURL:"));
        assert_eq!(Selector::default_setter("élan"), Selector::new("setÉlan:"));
        assert!(Selector::default_setter("x").takes_argument());
        assert!(!Selector::new("x").takes_argument());
    }

    #[test]
    fn test_object_id_display() {
        assert_eq!(ObjectId(0x1000).to_string(), "0x1000");
        assert!(ObjectId::NIL.is_nil());
    }
}
