/// 属性编辑器
///
/// 属性编辑的入口：从运行时属性元数据构造描述符，判断能否在这个具体实例上编辑，
/// 并构造绑定到属性访问器的编辑会话（附带 getter 切换能力）。

use std::ops::{Deref, DerefMut};

use super::mutable::MutableFieldEditor;
use super::session::FieldEditorSession;
use crate::policy::{self, Editability};
use crate::property::{AttributeDescriptor, PropertyAttributes};
use crate::runtime::{ObjectId, ObjectRuntime, RuntimeProperty};
use crate::utils::EditorError;
use crate::value::Value;

pub struct PropertyEditor<'r, R: ObjectRuntime> {
    editor: MutableFieldEditor<'r, R>,
    property: RuntimeProperty,
    attributes: PropertyAttributes,
}

impl<'r, R: ObjectRuntime> PropertyEditor<'r, R> {
    /// 属性能否在这个实例上编辑
    ///
    /// 除了编辑策略判断外，还要求目标非空、getter 当前可调用，
    /// 且调用方提供的当前值（如有）符合属性类型。
    pub fn can_edit_property(
        runtime: &R,
        property: &RuntimeProperty,
        target: ObjectId,
        current_value: Option<&Value>,
    ) -> bool {
        Self::check_editable(runtime, property, target, current_value).is_ok()
    }

    fn check_editable(
        runtime: &R,
        property: &RuntimeProperty,
        target: ObjectId,
        current_value: Option<&Value>,
    ) -> Result<AttributeDescriptor, EditorError> {
        let descriptor = AttributeDescriptor::from_property(property);
        let ty = descriptor.resolved_type();
        let unsupported = |reason: String| EditorError::UnsupportedProperty {
            name: property.name.clone(),
            reason,
        };

        match policy::classify(&descriptor, &ty) {
            Editability::Editable(_) => {}
            Editability::ReadOnly => return Err(unsupported("read-only".to_string())),
            Editability::Unsupported => return Err(unsupported(format!("type {} has no editor", ty))),
        }

        if target.is_nil() {
            return Err(unsupported("target is nil".to_string()));
        }
        if !runtime.responds_to(target, &descriptor.getter) {
            return Err(unsupported(format!("{} does not respond to {}", target, descriptor.getter)));
        }
        if let Some(value) = current_value {
            if !value.conforms_to(&ty) {
                return Err(unsupported(format!("current {} value does not fit {}", value.shape_name(), ty)));
            }
        }

        Ok(descriptor)
    }

    /// 为目标上的属性构造编辑器（尚未读取，状态为 Idle）
    ///
    /// # 返回
    /// `can_edit_property` 为 false 的任何情形（包括只读）都返回 `UnsupportedProperty`
    pub fn new(runtime: &'r R, target: ObjectId, property: &RuntimeProperty) -> Result<Self, EditorError> {
        let descriptor = Self::check_editable(runtime, property, target, None).inspect_err(|err| {
            tracing::debug!(property = %property.name, %target, error = %err, "property not editable");
        })?;

        let session = FieldEditorSession::new(runtime, target, descriptor)?;
        Ok(Self {
            editor: MutableFieldEditor::discover(session),
            attributes: PropertyAttributes::parse(&property.attributes),
            property: property.clone(),
        })
    }

    /// 按名称在目标的属性列表中查找并构造
    pub fn for_name(runtime: &'r R, target: ObjectId, name: &str) -> Result<Self, EditorError> {
        let properties = runtime.property_list(target)?;
        let property = properties
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| EditorError::UnsupportedProperty {
                name: name.to_string(),
                reason: format!("no such property on {}", target),
            })?;
        Self::new(runtime, target, property)
    }

    pub fn property(&self) -> &RuntimeProperty {
        &self.property
    }

    pub fn attributes(&self) -> &PropertyAttributes {
        &self.attributes
    }

    pub fn into_inner(self) -> MutableFieldEditor<'r, R> {
        self.editor
    }
}

impl<'r, R: ObjectRuntime> Deref for PropertyEditor<'r, R> {
    type Target = MutableFieldEditor<'r, R>;

    fn deref(&self) -> &Self::Target {
        &self.editor
    }
}

impl<R: ObjectRuntime> DerefMut for PropertyEditor<'_, R> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.editor
    }
}

impl<R: ObjectRuntime> std::fmt::Debug for PropertyEditor<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyEditor")
            .field("property", &self.property)
            .field("editor", &self.editor)
            .finish()
    }
}
