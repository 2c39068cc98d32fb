/// 类型化编辑器注册表
///
/// 每种受支持的类型形状恰好对应一个编辑策略，负责 值 -> 文本 与 文本 -> 值 的转换。
///
/// # 模块组成
///
/// - **scalar**: 整数、浮点、布尔
/// - **reference**: 对象引用与原始地址（只接受可重新解析为存活目标的文本）
/// - **composite**: 结构体与定长数组（逐字段递归）
///
/// # 文本语法
///
/// ```text
/// 整数     42  -7  0x2A
/// 浮点     1.5  -0.25  1e-3  inf
/// 布尔     YES / NO（也接受 true/false/1/0）
/// 对象     nil  0x6000  <UIView: 0x6000>
/// 地址     NULL  0x7ff0
/// 结构体   {1, 2}   嵌套 {{0, 0}, {320, 480}}
/// 数组     [1, 2, 3]
/// ```
pub mod composite;
pub mod reference;
pub mod scalar;

use thiserror::Error;

use crate::encoding::TypeClassification;
use crate::policy::{self, EditorKind};
use crate::runtime::ReferenceResolver;
use crate::utils::ParseError;
use crate::value::Value;

// === 导出公共接口 ===
pub use composite::{join_components, split_components, ArrayEditor, StructEditor};
pub use reference::{AddressEditor, ObjectRefEditor};
pub use scalar::{BooleanEditor, FloatEditor, IntegerEditor};

/// 值的形状与类型不符，无法格式化
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{shape} value cannot be shown as {ty}")]
pub struct FormatError {
    pub shape: &'static str,
    pub ty: String,
}

impl FormatError {
    pub fn new(ty: &TypeClassification, value: &Value) -> Self {
        Self { shape: value.shape_name(), ty: ty.to_string() }
    }
}

/// 编辑策略
pub trait TypedEditor: Sync {
    fn kind(&self) -> EditorKind;

    /// 值 -> 文本
    fn format(&self, ty: &TypeClassification, value: &Value) -> Result<String, FormatError>;

    /// 文本 -> 值；`resolver` 用于把地址重新解析为存活引用
    fn parse(
        &self,
        ty: &TypeClassification,
        text: &str,
        resolver: &dyn ReferenceResolver,
    ) -> Result<Value, ParseError>;
}

static INTEGER: IntegerEditor = IntegerEditor;
static FLOAT: FloatEditor = FloatEditor;
static BOOLEAN: BooleanEditor = BooleanEditor;
static OBJECT: ObjectRefEditor = ObjectRefEditor;
static ADDRESS: AddressEditor = AddressEditor;
static STRUCT: StructEditor = StructEditor;
static ARRAY: ArrayEditor = ArrayEditor;

/// 编辑器种类对应的唯一编辑策略
pub fn editor_for(kind: EditorKind) -> &'static dyn TypedEditor {
    match kind {
        EditorKind::Integer => &INTEGER,
        EditorKind::FloatingPoint => &FLOAT,
        EditorKind::Boolean => &BOOLEAN,
        EditorKind::ObjectReference => &OBJECT,
        EditorKind::Address => &ADDRESS,
        EditorKind::Struct => &STRUCT,
        EditorKind::Array => &ARRAY,
    }
}

/// 类型对应的编辑策略；类型的任何组成部分不受支持时返回 None
pub fn editor_for_type(ty: &TypeClassification) -> Option<&'static dyn TypedEditor> {
    if !policy::has_editor(ty) {
        return None;
    }
    EditorKind::for_type(ty).map(editor_for)
}

/// 用类型对应的编辑器格式化
pub fn format_value(ty: &TypeClassification, value: &Value) -> Result<String, FormatError> {
    match editor_for_type(ty) {
        Some(editor) => editor.format(ty, value),
        None => Err(FormatError::new(ty, value)),
    }
}

/// 用类型对应的编辑器解析
pub fn parse_text(
    ty: &TypeClassification,
    text: &str,
    resolver: &dyn ReferenceResolver,
) -> Result<Value, ParseError> {
    match editor_for_type(ty) {
        Some(editor) => editor.parse(ty, text, resolver),
        None => Err(ParseError::new(ty.to_string(), text, "type has no editor")),
    }
}
