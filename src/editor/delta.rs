/// 提交历史模块
///
/// 记录会话中每次成功提交的前后文本，支持撤销/重做。
/// 撤销与重做都通过会话的 解析 -> setter 路径重新提交，而不是直接改写目标。

use std::fmt;
use std::time::Instant;

use crate::runtime::Selector;

/// 提交历史
///
/// # 实现细节
/// - 使用两个栈实现撤销/重做：undo_stack 和 redo_stack
/// - 所有提交按时间顺序存储在 changes 向量中
/// - 栈中存储的是索引而非实际数据
#[derive(Debug, Clone, Default)]
pub struct CommitHistory {
    changes: Vec<CommitRecord>,
    undo_stack: Vec<usize>,
    redo_stack: Vec<usize>,
}

/// 单次成功提交
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// 属性名
    pub attribute: String,
    /// 写入使用的 setter
    pub setter: Selector,
    /// 提交前显示的文本
    pub old_text: String,
    /// 提交后重新读取的文本（setter 可能钳制输入）
    pub new_text: String,
    pub applied_at: Instant,
}

impl CommitHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次提交，并清空重做栈
    pub fn record(&mut self, change: CommitRecord) {
        let index = self.changes.len();
        self.changes.push(change);
        self.undo_stack.push(index);
        self.redo_stack.clear();
    }

    /// 下一个可撤销的提交
    pub fn peek_undo(&self) -> Option<&CommitRecord> {
        self.undo_stack.last().map(|&idx| &self.changes[idx])
    }

    /// 下一个可重做的提交
    pub fn peek_redo(&self) -> Option<&CommitRecord> {
        self.redo_stack.last().map(|&idx| &self.changes[idx])
    }

    /// 撤销最后一次提交
    pub fn undo(&mut self) -> Option<&CommitRecord> {
        let index = self.undo_stack.pop()?;
        self.redo_stack.push(index);
        Some(&self.changes[index])
    }

    /// 重做最后一次撤销
    pub fn redo(&mut self) -> Option<&CommitRecord> {
        let index = self.redo_stack.pop()?;
        self.undo_stack.push(index);
        Some(&self.changes[index])
    }

    /// 当前有效提交的数量（撤销栈大小）
    pub fn len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo_stack.is_empty()
    }

    /// 按应用顺序返回当前有效的提交
    pub fn iter(&self) -> impl Iterator<Item = &CommitRecord> {
        self.undo_stack.iter().map(|&idx| &self.changes[idx])
    }

    /// 所有提交（包括已撤销的）
    pub fn all_changes(&self) -> &[CommitRecord] {
        &self.changes
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// 生成摘要
    pub fn summary(&self) -> String {
        format!(
            "提交总数: {}, 有效提交: {}, 可撤销: {}, 可重做: {}",
            self.changes.len(),
            self.undo_stack.len(),
            self.can_undo(),
            self.can_redo()
        )
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() > 30 {
        format!("{}...", text.chars().take(30).collect::<String>())
    } else {
        text.to_string()
    }
}

impl fmt::Display for CommitRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}]: \"{}\" -> \"{}\"",
            self.attribute,
            self.setter,
            truncate(&self.old_text),
            truncate(&self.new_text)
        )
    }
}
