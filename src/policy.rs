//! 可编辑性策略
//!
//! 纯函数：给定属性描述与解析后的类型，判定 可编辑（及编辑器种类）/ 只读 / 不支持。

use std::fmt;

use crate::encoding::TypeClassification;
use crate::property::AttributeDescriptor;

/// 编辑器种类，与类型分类的顶层形状一一对应
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditorKind {
    /// 整数文本框
    Integer,
    /// 浮点文本框
    FloatingPoint,
    /// 开关
    Boolean,
    /// 对象引用（仅 nil 或可解析的地址）
    ObjectReference,
    /// 地址文本框
    Address,
    /// 结构体键值网格
    Struct,
    /// 定长数组网格
    Array,
}

impl EditorKind {
    /// 类型顶层形状对应的编辑器种类，Unknown 没有编辑器
    pub fn for_type(ty: &TypeClassification) -> Option<Self> {
        match ty {
            TypeClassification::Integer { .. } => Some(EditorKind::Integer),
            TypeClassification::FloatingPoint { .. } => Some(EditorKind::FloatingPoint),
            TypeClassification::Boolean => Some(EditorKind::Boolean),
            TypeClassification::ObjCObjectRef { .. } => Some(EditorKind::ObjectReference),
            TypeClassification::Pointer { .. } => Some(EditorKind::Address),
            TypeClassification::CStruct(_) => Some(EditorKind::Struct),
            TypeClassification::CArray { .. } => Some(EditorKind::Array),
            TypeClassification::Unknown => None,
        }
    }

    /// 界面显示名
    pub fn label(&self) -> &'static str {
        match self {
            EditorKind::Integer => "integer",
            EditorKind::FloatingPoint => "floating point",
            EditorKind::Boolean => "switch",
            EditorKind::ObjectReference => "object reference",
            EditorKind::Address => "address",
            EditorKind::Struct => "struct fields",
            EditorKind::Array => "array elements",
        }
    }
}

impl fmt::Display for EditorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 可编辑性判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Editability {
    Editable(EditorKind),
    ReadOnly,
    Unsupported,
}

impl Editability {
    pub fn is_editable(&self) -> bool {
        matches!(self, Editability::Editable(_))
    }

    pub fn editor_kind(&self) -> Option<EditorKind> {
        match self {
            Editability::Editable(kind) => Some(*kind),
            _ => None,
        }
    }
}

impl fmt::Display for Editability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Editability::Editable(kind) => write!(f, "editable ({})", kind),
            Editability::ReadOnly => write!(f, "read-only"),
            Editability::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// 判定属性的可编辑性
///
/// 只读判定优先，与类型无关。
pub fn classify(descriptor: &AttributeDescriptor, resolved: &TypeClassification) -> Editability {
    if descriptor.is_read_only || descriptor.setter.is_none() {
        return Editability::ReadOnly;
    }

    if !has_editor(resolved) {
        return Editability::Unsupported;
    }

    match EditorKind::for_type(resolved) {
        Some(kind) => Editability::Editable(kind),
        None => Editability::Unsupported,
    }
}

/// 类型（含所有嵌套组成部分）是否都有已注册的编辑器
pub fn has_editor(ty: &TypeClassification) -> bool {
    match ty {
        TypeClassification::Unknown => false,
        TypeClassification::CStruct(st) => {
            !st.fields.is_empty() && st.fields.iter().all(|f| has_editor(&f.ty))
        }
        TypeClassification::CArray { element, count } => *count > 0 && has_editor(element),
        TypeClassification::Pointer { pointee } => has_editor(pointee),
        _ => true,
    }
}
