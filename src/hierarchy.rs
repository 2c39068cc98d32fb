//! 视图层级浏览模型
//!
//! 从扁平的 (视图, 深度) 列表构造显示行；点击命中多个视图时可只显示命中的视图。
//! 选择确认后通过委托回调通知调用方。

use std::collections::HashMap;

use crate::runtime::{ObjectId, ObjectRuntime, SnapshotRuntime};
use crate::utils::EditorError;

/// 一行显示内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyRow {
    pub view: ObjectId,
    pub depth: usize,
    pub title: String,
    /// 是否在点击位置命中
    pub at_tap: bool,
    pub selected: bool,
}

impl HierarchyRow {
    /// 按深度缩进的标题
    pub fn indented_title(&self) -> String {
        format!("{}{}", "  ".repeat(self.depth), self.title)
    }
}

/// 选择确认回调
pub trait HierarchyDelegate {
    fn did_finish_with_selected_view(&mut self, selected: Option<ObjectId>);
}

pub struct HierarchyModel {
    all_views: Vec<ObjectId>,
    views_at_tap: Vec<ObjectId>,
    depths: HashMap<ObjectId, usize>,
    titles: HashMap<ObjectId, String>,
    selected: Option<ObjectId>,
    /// 仅显示点击命中的视图
    tap_only: bool,
    filter: String,
}

impl HierarchyModel {
    /// `all_views` 需按深度优先顺序排列；有点击命中视图时默认只显示它们
    pub fn new(
        all_views: Vec<ObjectId>,
        views_at_tap: Vec<ObjectId>,
        selected: Option<ObjectId>,
        depths: HashMap<ObjectId, usize>,
    ) -> Self {
        let tap_only = !views_at_tap.is_empty();
        Self {
            all_views,
            views_at_tap,
            depths,
            titles: HashMap::new(),
            selected,
            tap_only,
            filter: String::new(),
        }
    }

    /// 使用快照中的视图层级，标题取自类名
    pub fn from_snapshot(runtime: &SnapshotRuntime, views_at_tap: Vec<ObjectId>, selected: Option<ObjectId>) -> Self {
        let views = runtime.views();
        let depths = views.iter().copied().collect();
        let all_views = views.into_iter().map(|(view, _)| view).collect();
        Self::new(all_views, views_at_tap, selected, depths).with_titles_from(runtime)
    }

    pub fn with_titles_from<R: ObjectRuntime>(mut self, runtime: &R) -> Self {
        for view in &self.all_views {
            if let Some(class_name) = runtime.class_name_of(*view) {
                self.titles.insert(*view, format!("<{}: {}>", class_name, view));
            }
        }
        self
    }

    pub fn set_tap_only(&mut self, tap_only: bool) {
        self.tap_only = tap_only && !self.views_at_tap.is_empty();
    }

    pub fn is_tap_only(&self) -> bool {
        self.tap_only
    }

    /// 按标题过滤（不区分大小写）
    pub fn set_filter(&mut self, filter: &str) {
        self.filter = filter.trim().to_lowercase();
    }

    fn title_of(&self, view: ObjectId) -> String {
        self.titles.get(&view).cloned().unwrap_or_else(|| view.to_string())
    }

    /// 当前显示的行
    pub fn rows(&self) -> Vec<HierarchyRow> {
        let source = if self.tap_only { &self.views_at_tap } else { &self.all_views };

        source
            .iter()
            .map(|&view| HierarchyRow {
                view,
                depth: self.depths.get(&view).copied().unwrap_or(0),
                title: self.title_of(view),
                at_tap: self.views_at_tap.contains(&view),
                selected: self.selected == Some(view),
            })
            .filter(|row| self.filter.is_empty() || row.title.to_lowercase().contains(&self.filter))
            .collect()
    }

    /// 选择当前显示的第 `index` 行
    pub fn select_row(&mut self, index: usize) -> Result<ObjectId, EditorError> {
        let rows = self.rows();
        let row = rows.get(index).ok_or(EditorError::Index { index, len: rows.len() })?;
        self.selected = Some(row.view);
        Ok(row.view)
    }

    pub fn selected_view(&self) -> Option<ObjectId> {
        self.selected
    }

    /// 确认选择并通知委托
    pub fn finish(&self, delegate: &mut dyn HierarchyDelegate) {
        tracing::debug!(selected = ?self.selected, "hierarchy selection finished");
        delegate.did_finish_with_selected_view(self.selected);
    }
}
