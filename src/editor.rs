/// 编辑器层模块
///
/// 该模块提供有状态的编辑接口：一次会话绑定一个 (目标, 属性)，
/// 读取、编辑、提交三步分离，目标只会通过属性的 setter 被修改。
///
/// # 架构设计
///
/// - **session**: 字段编辑会话（状态机与提交流程）
/// - **mutable**: 在会话之上组合 getter 切换能力
/// - **property_editor**: 属性入口，负责可编辑性判断与会话构造
/// - **delta**: 提交历史，支持撤销/重做
///
/// # 使用示例
///
/// ```rust,ignore
/// use live_inspector::{PropertyEditor, SnapshotRuntime};
///
/// let runtime = SnapshotRuntime::load(Path::new("app.json"))?;
/// let mut editor = PropertyEditor::for_name(&runtime, target, "count")?;
///
/// editor.load()?;
/// editor.begin_edit("42")?;
/// editor.commit()?;
/// println!("当前值: {}", editor.text());
/// ```
pub mod delta;
pub mod mutable;
pub mod property_editor;
pub mod session;

// === 导出公共接口 ===
pub use delta::{CommitHistory, CommitRecord};
pub use mutable::MutableFieldEditor;
pub use property_editor::PropertyEditor;
pub use session::{FieldEditorSession, SessionState};
