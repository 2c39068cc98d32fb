/// 字段编辑会话
///
/// 一次会话对应一个 (目标, 属性) 上的一次编辑事务：通过 getter 读取当前值，
/// 交给类型化编辑器显示为文本，提交时解析文本并调用 setter。

use std::fmt;
use std::time::Instant;

use super::delta::{CommitHistory, CommitRecord};
use crate::editors::{self, TypedEditor};
use crate::encoding::TypeClassification;
use crate::policy::{self, Editability, EditorKind};
use crate::property::AttributeDescriptor;
use crate::runtime::{ObjectId, ObjectRuntime, Selector};
use crate::utils::{EditorError, InvocationError};
use crate::value::Value;

/// 会话状态
///
/// `Idle -> Loaded -> Editing -> Committing -> Loaded | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loaded,
    Editing,
    Committing,
    Failed,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Loaded => "loaded",
            SessionState::Editing => "editing",
            SessionState::Committing => "committing",
            SessionState::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 字段编辑会话
///
/// # 不变式
/// - 同一时刻至多一个待提交的值
/// - 每次提交都重新解析当前文本，从不复用缓存值
/// - 只通过声明的 setter 修改目标
///
/// 会话持有运行时与目标的非拥有引用；描述符在构造时复制一份，保证会话期间不变。
pub struct FieldEditorSession<'r, R: ObjectRuntime> {
    runtime: &'r R,
    target: ObjectId,
    descriptor: AttributeDescriptor,
    ty: TypeClassification,
    kind: EditorKind,
    editor: &'static dyn TypedEditor,
    /// 当前用于读取的 getter（可被切换）
    getter: Selector,
    state: SessionState,
    /// 文本缓冲
    text: String,
    /// 最近一次读取的权威值
    loaded_value: Option<Value>,
    loaded_text: Option<String>,
    last_error: Option<EditorError>,
    history: CommitHistory,
}

impl<'r, R: ObjectRuntime> FieldEditorSession<'r, R> {
    /// 创建会话
    ///
    /// # 返回
    /// 属性只读时返回 `ReadOnly`，类型没有编辑器时返回 `UnsupportedProperty`
    pub fn new(runtime: &'r R, target: ObjectId, descriptor: AttributeDescriptor) -> Result<Self, EditorError> {
        let ty = descriptor.resolved_type();

        let kind = match policy::classify(&descriptor, &ty) {
            Editability::Editable(kind) => kind,
            Editability::ReadOnly => return Err(EditorError::ReadOnly(descriptor.name)),
            Editability::Unsupported => {
                return Err(EditorError::UnsupportedProperty {
                    reason: format!("type {} has no editor", ty),
                    name: descriptor.name,
                })
            }
        };

        tracing::debug!(attribute = %descriptor.name, %target, %kind, "session created");

        Ok(Self {
            runtime,
            target,
            getter: descriptor.getter.clone(),
            descriptor,
            ty,
            kind,
            editor: editors::editor_for(kind),
            state: SessionState::Idle,
            text: String::new(),
            loaded_value: None,
            loaded_text: None,
            last_error: None,
            history: CommitHistory::new(),
        })
    }

    /// 通过当前 getter 读取值并格式化为文本
    ///
    /// 失败时状态与文本保持不变。编辑中调用会丢弃未提交的文本。
    pub fn load(&mut self) -> Result<(), EditorError> {
        if self.state == SessionState::Committing {
            return Err(self.invalid_state("load"));
        }
        self.reload()
    }

    fn reload(&mut self) -> Result<(), EditorError> {
        let value = match self.read_current() {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(attribute = %self.descriptor.name, getter = %self.getter, error = %err, "load failed");
                self.last_error = Some(err.clone());
                return Err(err);
            }
        };

        let text = match self.editor.format(&self.ty, &value) {
            Ok(text) => text,
            Err(err) => {
                let err = EditorError::Invocation(InvocationError::TypeMismatch {
                    selector: self.getter.to_string(),
                    reason: err.to_string(),
                });
                self.last_error = Some(err.clone());
                return Err(err);
            }
        };

        self.text = text.clone();
        self.loaded_text = Some(text);
        self.loaded_value = Some(value);
        self.last_error = None;
        self.state = SessionState::Loaded;
        Ok(())
    }

    fn read_current(&self) -> Result<Value, EditorError> {
        Ok(self.runtime.try_invoke_getter(self.target, &self.getter, &self.ty)?)
    }

    /// 提供编辑后的文本（此时不做校验）
    pub fn begin_edit(&mut self, text: impl Into<String>) -> Result<(), EditorError> {
        match self.state {
            SessionState::Loaded | SessionState::Editing | SessionState::Failed => {
                self.text = text.into();
                self.state = SessionState::Editing;
                Ok(())
            }
            SessionState::Idle | SessionState::Committing => Err(self.invalid_state("edit")),
        }
    }

    /// 结构体/数组的各组成部分文本；其他类型或当前文本无法拆分时为 None
    pub fn components(&self) -> Option<Vec<String>> {
        let (open, close) = match self.ty {
            TypeClassification::CStruct(_) => ('{', '}'),
            TypeClassification::CArray { .. } => ('[', ']'),
            _ => return None,
        };
        editors::split_components(&self.text, open, close)
            .map(|parts| parts.into_iter().map(str::to_string).collect())
    }

    /// 只修改一个组成部分，其余部分保持当前文本
    pub fn begin_edit_component(&mut self, index: usize, text: &str) -> Result<(), EditorError> {
        if matches!(self.state, SessionState::Idle | SessionState::Committing) {
            return Err(self.invalid_state("edit"));
        }
        let mut parts = self.components().unwrap_or_default();
        if index >= parts.len() {
            return Err(EditorError::Index { index, len: parts.len() });
        }
        parts[index] = text.trim().to_string();

        let (open, close) = match self.ty {
            TypeClassification::CArray { .. } => ('[', ']'),
            _ => ('{', '}'),
        };
        self.begin_edit(editors::join_components(open, close, &parts))
    }

    /// 解析当前文本并调用 setter
    ///
    /// 成功后重新读取目标，以反映 setter 可能做出的钳制。失败时进入 `Failed`，
    /// 错误同时保存在 [`last_error`](Self::last_error) 中。
    ///
    /// setter 生效但重新读取失败时返回 `ReloadFailed`；此时提交已记入历史，
    /// 可以用 [`revert_last`](Self::revert_last) 撤销。
    pub fn commit(&mut self) -> Result<(), EditorError> {
        if self.state != SessionState::Editing {
            return Err(self.invalid_state("commit"));
        }

        let old_text = self.loaded_text.clone().unwrap_or_default();
        let new_text = self.text.clone();
        let setter = self.write_text()?;

        let record = CommitRecord {
            attribute: self.descriptor.name.clone(),
            setter,
            old_text,
            new_text,
            applied_at: Instant::now(),
        };
        tracing::info!(%record, "committed");
        self.history.record(record);
        self.reload_after_write()
    }

    /// Committing 阶段：解析并写入，返回使用的 setter
    fn write_text(&mut self) -> Result<Selector, EditorError> {
        self.state = SessionState::Committing;

        let result = self
            .editor
            .parse(&self.ty, &self.text, self.runtime)
            .map_err(EditorError::from)
            .and_then(|value| {
                let setter = self.setter()?;
                self.runtime
                    .try_invoke_setter(self.target, setter, &self.ty, &value)
                    .map(|()| setter.clone())
                    .map_err(EditorError::from)
            });

        match result {
            Ok(setter) => Ok(setter),
            Err(err) => {
                tracing::warn!(attribute = %self.descriptor.name, text = %self.text, error = %err, "commit failed");
                self.state = SessionState::Failed;
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// 写入已生效后重新读取；失败时停留在 Failed
    fn reload_after_write(&mut self) -> Result<(), EditorError> {
        if let Err(err) = self.reload() {
            let err = EditorError::ReloadFailed {
                name: self.descriptor.name.clone(),
                error: Box::new(err),
            };
            self.state = SessionState::Failed;
            self.last_error = Some(err.clone());
            return Err(err);
        }
        Ok(())
    }

    fn setter(&self) -> Result<&Selector, EditorError> {
        self.descriptor
            .setter
            .as_ref()
            .ok_or_else(|| EditorError::ReadOnly(self.descriptor.name.clone()))
    }

    /// 撤销最后一次提交：把提交前的文本重新走一遍 解析 -> setter
    ///
    /// # 返回
    /// 没有可撤销的提交时返回 Ok(false)
    pub fn revert_last(&mut self) -> Result<bool, EditorError> {
        let Some(text) = self.history.peek_undo().map(|c| c.old_text.clone()) else {
            return Ok(false);
        };
        self.begin_edit(text)?;
        self.write_text()?;
        self.history.undo();
        self.reload_after_write()?;
        Ok(true)
    }

    /// 重新应用最近一次撤销的提交
    pub fn reapply_reverted(&mut self) -> Result<bool, EditorError> {
        let Some(text) = self.history.peek_redo().map(|c| c.new_text.clone()) else {
            return Ok(false);
        };
        self.begin_edit(text)?;
        self.write_text()?;
        self.history.redo();
        self.reload_after_write()?;
        Ok(true)
    }

    /// 切换读取用的 getter，setter 不变
    pub(crate) fn rebind_getter(&mut self, getter: Selector) {
        tracing::debug!(attribute = %self.descriptor.name, from = %self.getter, to = %getter, "getter rebound");
        self.getter = getter;
    }

    fn invalid_state(&self, operation: &'static str) -> EditorError {
        EditorError::InvalidState { operation, state: self.state.name() }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// 当前文本缓冲
    pub fn text(&self) -> &str {
        &self.text
    }

    /// 最近一次读取的值
    pub fn loaded_value(&self) -> Option<&Value> {
        self.loaded_value.as_ref()
    }

    pub fn last_error(&self) -> Option<&EditorError> {
        self.last_error.as_ref()
    }

    pub fn descriptor(&self) -> &AttributeDescriptor {
        &self.descriptor
    }

    pub fn target(&self) -> ObjectId {
        self.target
    }

    pub fn resolved_type(&self) -> &TypeClassification {
        &self.ty
    }

    pub fn editor_kind(&self) -> EditorKind {
        self.kind
    }

    /// 当前用于读取的 getter
    pub fn getter(&self) -> &Selector {
        &self.getter
    }

    pub fn history(&self) -> &CommitHistory {
        &self.history
    }

    pub fn runtime(&self) -> &'r R {
        self.runtime
    }
}

impl<R: ObjectRuntime> fmt::Debug for FieldEditorSession<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldEditorSession")
            .field("target", &self.target)
            .field("attribute", &self.descriptor.name)
            .field("type", &self.ty.to_string())
            .field("kind", &self.kind)
            .field("getter", &self.getter)
            .field("state", &self.state)
            .field("text", &self.text)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::SnapshotRuntime;

    fn runtime() -> (SnapshotRuntime, ObjectId) {
        let runtime = SnapshotRuntime::new();
        let target = runtime.insert_object(0x1000, "Counter", &["NSObject"]);
        runtime.add_property(target, "count", "Tq,N,V_count", "5").unwrap();
        runtime.add_property(target, "origin", "T{Point=\"x\"i\"y\"i},N", "{1, 2}").unwrap();
        (runtime, target)
    }

    fn open_session<'r>(runtime: &'r SnapshotRuntime, target: ObjectId, name: &str, encoding: &str) -> FieldEditorSession<'r, SnapshotRuntime> {
        FieldEditorSession::new(runtime, target, AttributeDescriptor::new(name, encoding, false)).unwrap()
    }

    #[test]
    fn test_state_machine() {
        let (runtime, target) = runtime();
        let mut session = open_session(&runtime, target, "count", "q");
        assert_eq!(session.state(), SessionState::Idle);

        // Idle 状态不能编辑或提交
        assert!(matches!(session.begin_edit("1"), Err(EditorError::InvalidState { .. })));
        assert!(matches!(session.commit(), Err(EditorError::InvalidState { state: "idle", .. })));

        session.load().unwrap();
        assert_eq!(session.state(), SessionState::Loaded);
        assert_eq!(session.text(), "5");

        // 未编辑时不能提交
        assert!(matches!(session.commit(), Err(EditorError::InvalidState { state: "loaded", .. })));

        session.begin_edit("6").unwrap();
        assert_eq!(session.state(), SessionState::Editing);
        session.commit().unwrap();
        assert_eq!(session.state(), SessionState::Loaded);
        assert_eq!(session.text(), "6");

        // 提交成功后需要重新编辑
        assert!(matches!(session.commit(), Err(EditorError::InvalidState { .. })));
    }

    #[test]
    fn test_failed_commit_can_be_edited_again() {
        let (runtime, target) = runtime();
        let mut session = open_session(&runtime, target, "count", "q");
        session.load().unwrap();

        session.begin_edit("x").unwrap();
        assert!(matches!(session.commit(), Err(EditorError::Parse(_))));
        assert_eq!(session.state(), SessionState::Failed);
        assert!(matches!(session.last_error(), Some(EditorError::Parse(_))));

        session.begin_edit("7").unwrap();
        session.commit().unwrap();
        assert_eq!(session.text(), "7");
        assert!(session.last_error().is_none());
    }

    #[test]
    fn test_load_failure_keeps_state() {
        let (runtime, target) = runtime();
        let mut session = open_session(&runtime, target, "count", "q");
        session.load().unwrap();

        runtime.deallocate(target);
        let err = session.load().unwrap_err();
        assert_eq!(err, EditorError::Invocation(InvocationError::TargetDeallocated(0x1000)));
        assert_eq!(session.state(), SessionState::Loaded);
        assert_eq!(session.text(), "5");
    }

    #[test]
    fn test_components() {
        let (runtime, target) = runtime();
        let mut session = open_session(&runtime, target, "origin", "{Point=\"x\"i\"y\"i}");
        session.load().unwrap();
        assert_eq!(session.components(), Some(vec!["1".to_string(), "2".to_string()]));

        session.begin_edit_component(1, "9").unwrap();
        assert_eq!(session.text(), "{1, 9}");
        assert!(matches!(session.begin_edit_component(2, "0"), Err(EditorError::Index { index: 2, len: 2 })));

        let scalar = open_session(&runtime, target, "count", "q");
        assert!(scalar.components().is_none());
    }

    #[test]
    fn test_component_edit_requires_loaded_session() {
        let (runtime, target) = runtime();
        let mut session = open_session(&runtime, target, "origin", "{Point=\"x\"i\"y\"i}");

        let err = session.begin_edit_component(0, "3").unwrap_err();
        assert_eq!(err, EditorError::InvalidState { operation: "edit", state: "idle" });
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_reload_failure_after_write_can_be_reverted() {
        let (runtime, target) = runtime();
        let mut session = open_session(&runtime, target, "count", "q");
        session.load().unwrap();

        // getter 消失，但 setter 仍然可用
        runtime.remove_selector(target, &Selector::new("count"));
        session.begin_edit("42").unwrap();
        let err = session.commit().unwrap_err();
        assert!(matches!(err, EditorError::ReloadFailed { ref name, .. } if name == "count"));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.last_error(), Some(&err));

        // 写入已记入历史
        assert_eq!(runtime.stored_value(target, "count"), Some(Value::Int(42)));
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history().peek_undo().map(|c| c.new_text.as_str()), Some("42"));

        // 撤销仍经由 setter 生效，即使重新读取依旧失败
        assert!(matches!(session.revert_last(), Err(EditorError::ReloadFailed { .. })));
        assert_eq!(runtime.stored_value(target, "count"), Some(Value::Int(5)));
        assert!(!session.history().can_undo());
        assert!(session.history().can_redo());
    }

    #[test]
    fn test_revert_and_reapply() {
        let (runtime, target) = runtime();
        let mut session = open_session(&runtime, target, "count", "q");
        assert!(!session.revert_last().unwrap());

        session.load().unwrap();
        session.begin_edit("10").unwrap();
        session.commit().unwrap();
        assert_eq!(session.history().len(), 1);

        assert!(session.revert_last().unwrap());
        assert_eq!(session.text(), "5");
        assert_eq!(runtime.stored_value(target, "count"), Some(Value::Int(5)));
        assert!(session.history().can_redo());

        assert!(session.reapply_reverted().unwrap());
        assert_eq!(runtime.stored_value(target, "count"), Some(Value::Int(10)));
        assert!(!session.history().can_redo());
    }

    #[test]
    fn test_rejects_read_only_and_unsupported() {
        let (runtime, target) = runtime();
        let err = FieldEditorSession::new(&runtime, target, AttributeDescriptor::new("count", "q", true)).unwrap_err();
        assert_eq!(err, EditorError::ReadOnly("count".to_string()));

        let err = FieldEditorSession::new(&runtime, target, AttributeDescriptor::new("block", "@?", false)).unwrap_err();
        assert!(matches!(err, EditorError::UnsupportedProperty { .. }));
    }
}
