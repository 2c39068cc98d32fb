use crate::encoding::{self, TypeClassification};
use crate::runtime::{RuntimeProperty, Selector};

// 属性标志位定义
bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PropertyFlags: u32 {
        const READONLY = 0x0001;     // R
        const COPY = 0x0002;         // C
        const RETAIN = 0x0004;       // &
        const NONATOMIC = 0x0008;    // N
        const DYNAMIC = 0x0010;      // D
        const WEAK = 0x0020;         // W
        const COLLECTABLE = 0x0040;  // P
    }
}

/// 解析后的属性字符串
///
/// 格式：`T<编码>,R,C,&,W,N,D,P,G<getter>,S<setter>,V<ivar>`，各项以逗号分隔。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PropertyAttributes {
    /// T 项（类型编码），缺失时为空串
    pub type_encoding: String,
    pub flags: PropertyFlags,
    /// G 项
    pub custom_getter: Option<Selector>,
    /// S 项
    pub custom_setter: Option<Selector>,
    /// V 项（后备实例变量名）
    pub ivar: Option<String>,
}

impl PropertyAttributes {
    /// 解析属性字符串，无法识别的项被忽略
    pub fn parse(attributes: &str) -> Self {
        let mut parsed = PropertyAttributes::default();

        for item in split_attribute_items(attributes) {
            let mut chars = item.chars();
            let Some(code) = chars.next() else {
                continue;
            };
            let rest = chars.as_str();

            match code {
                'T' => parsed.type_encoding = rest.to_string(),
                'R' => parsed.flags |= PropertyFlags::READONLY,
                'C' => parsed.flags |= PropertyFlags::COPY,
                '&' => parsed.flags |= PropertyFlags::RETAIN,
                'N' => parsed.flags |= PropertyFlags::NONATOMIC,
                'D' => parsed.flags |= PropertyFlags::DYNAMIC,
                'W' => parsed.flags |= PropertyFlags::WEAK,
                'P' => parsed.flags |= PropertyFlags::COLLECTABLE,
                'G' if !rest.is_empty() => parsed.custom_getter = Some(Selector::new(rest)),
                'S' if !rest.is_empty() => parsed.custom_setter = Some(Selector::new(rest)),
                'V' if !rest.is_empty() => parsed.ivar = Some(rest.to_string()),
                _ => {
                    tracing::debug!(item, "ignoring unrecognized property attribute");
                }
            }
        }

        parsed
    }

    pub fn is_read_only(&self) -> bool {
        self.flags.contains(PropertyFlags::READONLY)
    }
}

/// 按顶层逗号切分（类型编码中的引号/括号内可能出现逗号）
fn split_attribute_items(attributes: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0i32;
    let mut in_quotes = false;
    let mut start = 0;

    for (i, c) in attributes.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '{' | '[' | '(' if !in_quotes => depth += 1,
            '}' | ']' | ')' if !in_quotes => depth -= 1,
            ',' if depth == 0 && !in_quotes => {
                items.push(&attributes[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&attributes[start..]);
    items
}

/// 一个可检查的属性
///
/// 每次检查查询构造一次，不可变。不变式：`setter` 存在 ⇒ `is_read_only` 为 false。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDescriptor {
    pub name: String,
    /// 原始类型编码
    pub type_encoding: String,
    pub is_read_only: bool,
    pub getter: Selector,
    /// 只读或无法确定 setter 时为 None
    pub setter: Option<Selector>,
}

impl AttributeDescriptor {
    /// 使用默认访问器命名构造
    pub fn new(name: impl Into<String>, type_encoding: impl Into<String>, is_read_only: bool) -> Self {
        let name = name.into();
        let setter = (!is_read_only).then(|| Selector::default_setter(&name));
        Self {
            getter: Selector::new(name.clone()),
            name,
            type_encoding: type_encoding.into(),
            is_read_only,
            setter,
        }
    }

    /// 从运行时属性元数据构造
    pub fn from_property(property: &RuntimeProperty) -> Self {
        let attributes = PropertyAttributes::parse(&property.attributes);
        Self::from_attributes(&property.name, &attributes)
    }

    pub fn from_attributes(name: &str, attributes: &PropertyAttributes) -> Self {
        let is_read_only = attributes.is_read_only();
        let getter = attributes
            .custom_getter
            .clone()
            .unwrap_or_else(|| Selector::new(name));
        let setter = if is_read_only {
            None
        } else {
            Some(
                attributes
                    .custom_setter
                    .clone()
                    .unwrap_or_else(|| Selector::default_setter(name)),
            )
        };

        Self {
            name: name.to_string(),
            type_encoding: attributes.type_encoding.clone(),
            is_read_only,
            getter,
            setter,
        }
    }

    /// 解析类型编码
    pub fn resolved_type(&self) -> TypeClassification {
        encoding::resolve(&self.type_encoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attributes() {
        let attrs = PropertyAttributes::parse("T@\"NSString\",C,N,V_title");
        assert_eq!(attrs.type_encoding, "@\"NSString\"");
        assert!(attrs.flags.contains(PropertyFlags::COPY | PropertyFlags::NONATOMIC));
        assert!(!attrs.is_read_only());
        assert_eq!(attrs.ivar.as_deref(), Some("_title"));
    }

    #[test]
    fn test_parse_custom_accessors() {
        let attrs = PropertyAttributes::parse("TB,N,GisHidden,SsetHiddenAnimated:");
        assert_eq!(attrs.custom_getter, Some(Selector::new("isHidden")));
        assert_eq!(attrs.custom_setter, Some(Selector::new("setHiddenAnimated:")));
    }

    #[test]
    fn test_struct_encoding_not_split() {
        let attrs = PropertyAttributes::parse("T{CGRect={CGPoint=dd}{CGSize=dd}},R,N");
        assert_eq!(attrs.type_encoding, "{CGRect={CGPoint=dd}{CGSize=dd}}");
        assert!(attrs.is_read_only());
    }

    #[test]
    fn test_descriptor_from_property() {
        let descriptor = AttributeDescriptor::from_property(&RuntimeProperty::new("count", "Tq,N,V_count"));
        assert_eq!(descriptor.getter, Selector::new("count"));
        assert_eq!(descriptor.setter, Some(Selector::new("setCount:")));
        assert!(!descriptor.is_read_only);

        let descriptor = AttributeDescriptor::from_property(&RuntimeProperty::new("hash", "TQ,R"));
        assert!(descriptor.is_read_only);
        assert_eq!(descriptor.setter, None);
    }

    #[test]
    fn test_read_only_drops_custom_setter() {
        // 只读属性即使带 S 项也不暴露 setter
        let descriptor = AttributeDescriptor::from_property(&RuntimeProperty::new("size", "Tq,R,SsetSize:"));
        assert!(descriptor.setter.is_none());
    }

    #[test]
    fn test_missing_type_is_unknown() {
        let descriptor = AttributeDescriptor::from_property(&RuntimeProperty::new("odd", "N,&"));
        assert_eq!(descriptor.resolved_type(), TypeClassification::Unknown);
    }
}
