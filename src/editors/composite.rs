use super::{format_value, parse_text, FormatError, TypedEditor};
use crate::encoding::TypeClassification;
use crate::policy::EditorKind;
use crate::runtime::ReferenceResolver;
use crate::utils::ParseError;
use crate::value::Value;

/// 结构体编辑器：`{f0, f1, ...}`，逐字段使用字段自身的编辑器
pub struct StructEditor;

impl TypedEditor for StructEditor {
    fn kind(&self) -> EditorKind {
        EditorKind::Struct
    }

    fn format(&self, ty: &TypeClassification, value: &Value) -> Result<String, FormatError> {
        let (TypeClassification::CStruct(st), Value::Struct(values)) = (ty, value) else {
            return Err(FormatError::new(ty, value));
        };
        if values.len() != st.fields.len() {
            return Err(FormatError::new(ty, value));
        }

        let parts = st
            .fields
            .iter()
            .zip(values)
            .map(|(field, field_value)| format_value(&field.ty, field_value))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(join_components('{', '}', &parts))
    }

    fn parse(
        &self,
        ty: &TypeClassification,
        text: &str,
        resolver: &dyn ReferenceResolver,
    ) -> Result<Value, ParseError> {
        let TypeClassification::CStruct(st) = ty else {
            return Err(ParseError::new(ty.to_string(), text, "not a struct type"));
        };

        let components = split_components(text, '{', '}')
            .ok_or_else(|| ParseError::new(ty.to_string(), text, "expected {field, ...}"))?;

        if components.len() != st.fields.len() {
            return Err(ParseError::new(
                ty.to_string(),
                text,
                format!("expected {} fields, found {}", st.fields.len(), components.len()),
            ));
        }

        let mut values = Vec::with_capacity(components.len());
        for (index, (field, component)) in st.fields.iter().zip(components).enumerate() {
            let value = parse_text(&field.ty, component, resolver).map_err(|err| {
                let label = field.name.clone().unwrap_or_else(|| index.to_string());
                ParseError::new(ty.to_string(), text, format!("field {}: {}", label, err.detail))
            })?;
            values.push(value);
        }

        Ok(Value::Struct(values))
    }
}

/// 定长数组编辑器：`[e0, e1, ...]`，元素数量必须与编码一致
pub struct ArrayEditor;

impl TypedEditor for ArrayEditor {
    fn kind(&self) -> EditorKind {
        EditorKind::Array
    }

    fn format(&self, ty: &TypeClassification, value: &Value) -> Result<String, FormatError> {
        let (TypeClassification::CArray { element, count }, Value::Array(values)) = (ty, value) else {
            return Err(FormatError::new(ty, value));
        };
        if values.len() != *count {
            return Err(FormatError::new(ty, value));
        }

        let parts = values
            .iter()
            .map(|v| format_value(element, v))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(join_components('[', ']', &parts))
    }

    fn parse(
        &self,
        ty: &TypeClassification,
        text: &str,
        resolver: &dyn ReferenceResolver,
    ) -> Result<Value, ParseError> {
        let TypeClassification::CArray { element, count } = ty else {
            return Err(ParseError::new(ty.to_string(), text, "not an array type"));
        };

        let components = split_components(text, '[', ']')
            .ok_or_else(|| ParseError::new(ty.to_string(), text, "expected [element, ...]"))?;

        if components.len() != *count {
            return Err(ParseError::new(
                ty.to_string(),
                text,
                format!("expected {} elements, found {}", count, components.len()),
            ));
        }

        components
            .into_iter()
            .enumerate()
            .map(|(index, component)| {
                parse_text(element, component, resolver).map_err(|err| {
                    ParseError::new(ty.to_string(), text, format!("element {}: {}", index, err.detail))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }
}

/// 拆分 `open ... close` 内的顶层逗号分隔部分
///
/// 外层括号缺失或括号不配对时返回 None。
pub fn split_components(text: &str, open: char, close: char) -> Option<Vec<&str>> {
    let inner = text.trim().strip_prefix(open)?.strip_suffix(close)?;
    if inner.trim().is_empty() {
        return Some(Vec::new());
    }

    let mut components = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for (i, c) in inner.char_indices() {
        match c {
            '{' | '[' | '(' | '<' => depth += 1,
            '}' | ']' | ')' | '>' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            ',' if depth == 0 => {
                components.push(inner[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }

    if depth != 0 {
        return None;
    }
    components.push(inner[start..].trim());
    Some(components)
}

/// 合并各部分文本
pub fn join_components(open: char, close: char, parts: &[String]) -> String {
    format!("{}{}{}", open, parts.join(", "), close)
}
