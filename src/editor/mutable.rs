/// 可切换 getter 的字段编辑器
///
/// 在会话之上附加"读取来源切换"能力：同一底层值可能有多个同义 getter，
/// 切换后用新的 getter 重新读取，setter 保持不变。

use std::ops::{Deref, DerefMut};

use super::session::FieldEditorSession;
use crate::runtime::{ObjectRuntime, Selector};
use crate::utils::EditorError;

pub struct MutableFieldEditor<'r, R: ObjectRuntime> {
    session: FieldEditorSession<'r, R>,
    /// 第 0 项总是属性自身的 getter
    available_getters: Vec<Selector>,
    selected: usize,
}

impl<'r, R: ObjectRuntime> MutableFieldEditor<'r, R> {
    /// 使用给定的同义 getter 列表（重复项与属性自身的 getter 会被去掉）
    pub fn new(session: FieldEditorSession<'r, R>, synonyms: Vec<Selector>) -> Self {
        let mut available_getters = vec![session.descriptor().getter.clone()];
        for getter in synonyms {
            if !available_getters.contains(&getter) {
                available_getters.push(getter);
            }
        }

        Self { session, available_getters, selected: 0 }
    }

    /// 从运行时发现同义 getter
    pub fn discover(session: FieldEditorSession<'r, R>) -> Self {
        let synonyms = session
            .runtime()
            .getter_synonyms(session.target(), &session.descriptor().name);
        Self::new(session, synonyms)
    }

    pub fn available_getters(&self) -> &[Selector] {
        &self.available_getters
    }

    pub fn selected_getter_index(&self) -> usize {
        self.selected
    }

    pub fn selected_getter(&self) -> &Selector {
        &self.available_getters[self.selected]
    }

    /// 切换读取用的 getter 并重新读取
    ///
    /// 索引越界返回 `Index` 错误；新 getter 读取失败时恢复原 getter。
    /// 两种情况下会话状态与显示文本都保持不变。
    pub fn select_getter(&mut self, index: usize) -> Result<(), EditorError> {
        let Some(getter) = self.available_getters.get(index).cloned() else {
            return Err(EditorError::Index { index, len: self.available_getters.len() });
        };

        let previous = self.session.getter().clone();
        self.session.rebind_getter(getter);

        if let Err(err) = self.session.load() {
            self.session.rebind_getter(previous);
            return Err(err);
        }

        self.selected = index;
        Ok(())
    }

    /// getter 切换按钮的标题
    pub fn title_for_getter_button(&self) -> String {
        format!("Getter: {}", self.selected_getter())
    }

    pub fn session(&self) -> &FieldEditorSession<'r, R> {
        &self.session
    }

    pub fn into_session(self) -> FieldEditorSession<'r, R> {
        self.session
    }
}

impl<'r, R: ObjectRuntime> Deref for MutableFieldEditor<'r, R> {
    type Target = FieldEditorSession<'r, R>;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl<R: ObjectRuntime> DerefMut for MutableFieldEditor<'_, R> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.session
    }
}

impl<R: ObjectRuntime> std::fmt::Debug for MutableFieldEditor<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutableFieldEditor")
            .field("session", &self.session)
            .field("available_getters", &self.available_getters)
            .field("selected", &self.selected)
            .finish()
    }
}
