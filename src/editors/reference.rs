use super::{FormatError, TypedEditor};
use crate::encoding::TypeClassification;
use crate::policy::EditorKind;
use crate::runtime::ReferenceResolver;
use crate::utils::{is_nil_literal, parse_address_token, parse_description_token, ParseError};
use crate::value::{ObjectRef, Value};

/// 对象引用编辑器
///
/// 只接受运行时能重新解析为存活对象的文本：空引用字面量、`0xADDR`、
/// 或 `<ClassName: 0xADDR>`。任意其他文本都不会被强制转换为对象引用。
pub struct ObjectRefEditor;

impl TypedEditor for ObjectRefEditor {
    fn kind(&self) -> EditorKind {
        EditorKind::ObjectReference
    }

    fn format(&self, ty: &TypeClassification, value: &Value) -> Result<String, FormatError> {
        match value {
            Value::Object(object) => Ok(object.to_string()),
            _ => Err(FormatError::new(ty, value)),
        }
    }

    fn parse(
        &self,
        ty: &TypeClassification,
        text: &str,
        resolver: &dyn ReferenceResolver,
    ) -> Result<Value, ParseError> {
        let TypeClassification::ObjCObjectRef { class_name: expected_class } = ty else {
            return Err(ParseError::new(ty.to_string(), text, "not an object type"));
        };
        let fail = |detail: String| ParseError::new(ty.to_string(), text, detail);

        if is_nil_literal(text) {
            return Ok(Value::Object(ObjectRef::nil()));
        }

        let (claimed_class, address) = match parse_description_token(text) {
            Some((class_name, address)) => (Some(class_name), address),
            None => match parse_address_token(text) {
                Some(address) => (None, address),
                None => return Err(fail("expected nil, 0xADDR or <Class: 0xADDR>".to_string())),
            },
        };

        let object = resolver
            .resolve_object(address)
            .ok_or_else(|| fail(format!("no live object at 0x{:x}", address)))?;

        if let (Some(claimed), Some(actual)) = (claimed_class, object.class_name.as_deref()) {
            if claimed != actual {
                return Err(fail(format!("object at 0x{:x} is a {}, not a {}", address, actual, claimed)));
            }
        }

        // 协议限定（`<NSCopying>`）无法按类检查
        if let Some(expected) = expected_class.as_deref().filter(|name| !name.starts_with('<')) {
            if !resolver.is_kind_of(&object, expected) {
                return Err(fail(format!("object at 0x{:x} is not a kind of {}", address, expected)));
            }
        }

        Ok(Value::Object(object))
    }
}

/// 原始指针编辑器：显示十六进制地址，非空地址必须可读
pub struct AddressEditor;

impl TypedEditor for AddressEditor {
    fn kind(&self) -> EditorKind {
        EditorKind::Address
    }

    fn format(&self, ty: &TypeClassification, value: &Value) -> Result<String, FormatError> {
        match value {
            Value::Pointer(0) => Ok("NULL".to_string()),
            Value::Pointer(address) => Ok(format!("0x{:x}", address)),
            _ => Err(FormatError::new(ty, value)),
        }
    }

    fn parse(
        &self,
        ty: &TypeClassification,
        text: &str,
        resolver: &dyn ReferenceResolver,
    ) -> Result<Value, ParseError> {
        if is_nil_literal(text) {
            return Ok(Value::Pointer(0));
        }

        let address = parse_address_token(text)
            .ok_or_else(|| ParseError::new(ty.to_string(), text, "expected NULL or 0xADDR"))?;

        if !resolver.is_readable_address(address) {
            return Err(ParseError::new(
                ty.to_string(),
                text,
                format!("address 0x{:x} is not readable", address),
            ));
        }

        Ok(Value::Pointer(address))
    }
}
