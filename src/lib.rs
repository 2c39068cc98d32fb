pub mod encoding;
pub mod layout;
pub mod value;
pub mod policy;
pub mod editors;
pub mod runtime;
pub mod property;
pub mod editor;
pub mod hierarchy;
pub mod syslog;
pub mod globals;
pub mod utils;
pub mod debug;

// 重新导出主要结构
pub use encoding::{resolve, StructField, StructType, TypeClassification};
pub use value::{ObjectRef, Value};
pub use policy::{classify, Editability, EditorKind};
pub use editors::{editor_for, editor_for_type, format_value, parse_text, TypedEditor};
pub use runtime::{
    AccessorInvoker, ObjectId, ObjectRuntime, ReferenceResolver, RuntimeProperty, Selector, SnapshotRuntime,
};
pub use property::{AttributeDescriptor, PropertyAttributes, PropertyFlags};
pub use editor::{CommitHistory, FieldEditorSession, MutableFieldEditor, PropertyEditor, SessionState};
pub use utils::{EditorError, InspectorError, InvocationError, ParseError};
pub use debug::InspectorDebugger;

/// 库级结果类型
pub type Result<T, E = InspectorError> = std::result::Result<T, E>;

// 快照文件扩展名
pub const SNAPSHOT_EXTENSIONS: &[&str] = &["json"];
