//! 运行时类型编码解析
//!
//! 将运行时提供的类型编码字符串（如 `q`、`@"NSString"`、`{CGPoint=dd}`、`[4i]`）
//! 解析为封闭的 [`TypeClassification`]。解析是全函数：任何无法识别或格式错误的
//! 输入都得到 [`TypeClassification::Unknown`]，绝不返回错误或 panic。

use std::fmt;

/// 嵌套深度上限（防止恶意编码导致栈溢出）
const MAX_NESTING_DEPTH: usize = 64;

/// 指针宽度（LP64）
pub const POINTER_SIZE: usize = 8;

/// 类型分类
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeClassification {
    /// 整数，`width` 以位为单位
    Integer { width: u8, signed: bool },
    /// 浮点数，`width` 以位为单位（32 或 64）
    FloatingPoint { width: u8 },
    Boolean,
    /// 对象引用，`class_name` 来自 `@"ClassName"` 标注
    ObjCObjectRef { class_name: Option<String> },
    CStruct(StructType),
    CArray { element: Box<TypeClassification>, count: usize },
    Pointer { pointee: Box<TypeClassification> },
    Unknown,
}

/// 结构体类型
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructType {
    /// 结构体名（匿名结构体为 None）
    pub name: Option<String>,
    /// 按声明顺序排列的字段
    pub fields: Vec<StructField>,
    /// 总大小（含尾部填充）
    pub size: usize,
    pub align: usize,
}

/// 结构体字段
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructField {
    /// 字段名（仅当编码带引号字段名时存在）
    pub name: Option<String>,
    /// 相对结构体起始的字节偏移
    pub offset: usize,
    pub ty: TypeClassification,
}

/// 解析类型编码
pub fn resolve(type_encoding: &str) -> TypeClassification {
    let mut parser = EncodingParser::new(type_encoding);

    let resolved = match parser.parse_type(false) {
        Ok(ty) if parser.at_end() => ty,
        _ => TypeClassification::Unknown,
    };

    tracing::trace!(encoding = type_encoding, ?resolved, "resolved type encoding");
    resolved
}

impl TypeClassification {
    /// 字节大小，Unknown 或无法确定时返回 None
    pub fn size_of(&self) -> Option<usize> {
        match self {
            TypeClassification::Integer { width, .. } => Some(*width as usize / 8),
            TypeClassification::FloatingPoint { width } => Some(*width as usize / 8),
            TypeClassification::Boolean => Some(1),
            TypeClassification::ObjCObjectRef { .. } | TypeClassification::Pointer { .. } => {
                Some(POINTER_SIZE)
            }
            TypeClassification::CStruct(st) => Some(st.size),
            TypeClassification::CArray { element, count } => element.size_of()?.checked_mul(*count),
            TypeClassification::Unknown => None,
        }
    }

    /// 自然对齐
    pub fn align_of(&self) -> Option<usize> {
        match self {
            TypeClassification::CStruct(st) => Some(st.align),
            TypeClassification::CArray { element, .. } => element.align_of(),
            TypeClassification::Unknown => None,
            scalar => scalar.size_of(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, TypeClassification::Unknown)
    }
}

impl fmt::Display for TypeClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeClassification::Integer { width, signed } => {
                let base = match width {
                    8 => "char",
                    16 => "short",
                    32 => "int",
                    _ => "long long",
                };
                if *signed {
                    write!(f, "{}", base)
                } else {
                    write!(f, "unsigned {}", base)
                }
            }
            TypeClassification::FloatingPoint { width: 32 } => write!(f, "float"),
            TypeClassification::FloatingPoint { .. } => write!(f, "double"),
            TypeClassification::Boolean => write!(f, "BOOL"),
            TypeClassification::ObjCObjectRef { class_name: Some(name) } => write!(f, "{} *", name),
            TypeClassification::ObjCObjectRef { class_name: None } => write!(f, "id"),
            TypeClassification::CStruct(st) => {
                write!(f, "struct {}", st.name.as_deref().unwrap_or("?"))
            }
            TypeClassification::CArray { element, count } => write!(f, "{}[{}]", element, count),
            TypeClassification::Pointer { pointee } => match pointee.as_ref() {
                TypeClassification::Unknown => write!(f, "void *"),
                other => write!(f, "{} *", other),
            },
            TypeClassification::Unknown => write!(f, "?"),
        }
    }
}

/// 语法错误（仅在解析器内部使用，对外统一折叠为 Unknown）
struct Malformed;

type ParseResult = Result<TypeClassification, Malformed>;

/// 递归下降解析器
struct EncodingParser<'a> {
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> EncodingParser<'a> {
    fn new(encoding: &'a str) -> Self {
        Self {
            bytes: encoding.as_bytes(),
            pos: 0,
            depth: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn expect(&mut self, byte: u8) -> Result<(), Malformed> {
        if self.next() == Some(byte) {
            Ok(())
        } else {
            Err(Malformed)
        }
    }

    /// 解析单个类型
    ///
    /// `in_named_struct` 为 true 时，对象类名与后续带引号字段名存在歧义，需要前瞻判断。
    fn parse_type(&mut self, in_named_struct: bool) -> ParseResult {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(Malformed);
        }
        let result = self.parse_type_inner(in_named_struct);
        self.depth -= 1;
        result
    }

    fn parse_type_inner(&mut self, in_named_struct: bool) -> ParseResult {
        // 方法限定符：const / in / inout / out / bycopy / byref / oneway
        while matches!(self.peek(), Some(b'r' | b'n' | b'N' | b'o' | b'O' | b'R' | b'V')) {
            self.pos += 1;
        }

        let int = |width: u8, signed: bool| -> ParseResult {
            Ok(TypeClassification::Integer { width, signed })
        };

        match self.next().ok_or(Malformed)? {
            b'c' => int(8, true),
            b'C' => int(8, false),
            b's' => int(16, true),
            b'S' => int(16, false),
            b'i' | b'l' => int(32, true),
            b'I' | b'L' => int(32, false),
            b'q' => int(64, true),
            b'Q' => int(64, false),
            b'f' => Ok(TypeClassification::FloatingPoint { width: 32 }),
            b'd' => Ok(TypeClassification::FloatingPoint { width: 64 }),
            b'B' => Ok(TypeClassification::Boolean),
            // long double / void / SEL / 未知类型
            b'D' | b'v' | b':' | b'?' => Ok(TypeClassification::Unknown),
            b'*' => Ok(TypeClassification::Pointer {
                pointee: Box::new(TypeClassification::Integer { width: 8, signed: true }),
            }),
            b'#' => Ok(TypeClassification::ObjCObjectRef { class_name: None }),
            b'@' => self.parse_object(in_named_struct),
            b'^' => {
                let pointee = self.parse_type(false)?;
                Ok(TypeClassification::Pointer { pointee: Box::new(pointee) })
            }
            b'[' => self.parse_array(),
            b'{' => self.parse_struct(),
            b'(' => self.skip_union(),
            b'b' => {
                // 位域：宽度之后没有类型
                self.parse_number().ok_or(Malformed)?;
                Ok(TypeClassification::Unknown)
            }
            b'j' | b'A' => {
                // _Complex / _Atomic 修饰的类型不可编辑
                self.parse_type(in_named_struct)?;
                Ok(TypeClassification::Unknown)
            }
            _ => Err(Malformed),
        }
    }

    fn parse_object(&mut self, in_named_struct: bool) -> ParseResult {
        match self.peek() {
            Some(b'?') => {
                // block，可能带 `<...>` 签名
                self.pos += 1;
                if self.peek() == Some(b'<') {
                    self.skip_balanced(b'<', b'>')?;
                }
                Ok(TypeClassification::Pointer { pointee: Box::new(TypeClassification::Unknown) })
            }
            Some(b'"') => {
                let checkpoint = self.pos;
                let class_name = self.parse_quoted()?;

                // 结构体内 `@"name"` 后若紧跟类型字符，则引号内容其实是下一个字段名
                if in_named_struct && !matches!(self.peek(), None | Some(b'"') | Some(b'}')) {
                    self.pos = checkpoint;
                    return Ok(TypeClassification::ObjCObjectRef { class_name: None });
                }

                let class_name = if class_name.is_empty() { None } else { Some(class_name) };
                Ok(TypeClassification::ObjCObjectRef { class_name })
            }
            _ => Ok(TypeClassification::ObjCObjectRef { class_name: None }),
        }
    }

    fn parse_array(&mut self) -> ParseResult {
        let count = self.parse_number().ok_or(Malformed)?;
        let element = self.parse_type(false)?;
        self.expect(b']')?;

        if element.is_unknown() {
            return Ok(TypeClassification::Unknown);
        }

        Ok(TypeClassification::CArray { element: Box::new(element), count })
    }

    fn parse_struct(&mut self) -> ParseResult {
        let name_start = self.pos;
        while !matches!(self.peek(), None | Some(b'=') | Some(b'}')) {
            self.pos += 1;
        }
        let raw_name = std::str::from_utf8(&self.bytes[name_start..self.pos]).map_err(|_| Malformed)?;
        let name = match raw_name {
            "" | "?" => None,
            other => Some(other.to_string()),
        };

        // 不透明结构体 `{Name}`
        if self.next().ok_or(Malformed)? == b'}' {
            return Ok(TypeClassification::CStruct(StructType { name, fields: Vec::new(), size: 0, align: 1 }));
        }

        let mut members = Vec::new();
        let mut has_unknown_member = false;
        while self.peek() != Some(b'}') {
            if self.at_end() {
                return Err(Malformed);
            }

            let field_name = if self.peek() == Some(b'"') {
                Some(self.parse_quoted()?)
            } else {
                None
            };
            let ty = self.parse_type(field_name.is_some())?;
            has_unknown_member |= ty.is_unknown();
            members.push((field_name, ty));
        }
        self.expect(b'}')?;

        // 任一字段布局未知时，后续偏移无法确定，整体视为 Unknown
        if has_unknown_member {
            return Ok(TypeClassification::Unknown);
        }

        Ok(Self::layout_struct(name, members).unwrap_or(TypeClassification::Unknown))
    }

    /// 按自然对齐计算字段偏移
    fn layout_struct(
        name: Option<String>,
        members: Vec<(Option<String>, TypeClassification)>,
    ) -> Option<TypeClassification> {
        let mut offset = 0usize;
        let mut align = 1usize;
        let mut fields = Vec::with_capacity(members.len());

        for (field_name, ty) in members {
            let field_align = ty.align_of()?.max(1);
            let field_size = ty.size_of()?;

            offset = round_up(offset, field_align);
            fields.push(StructField { name: field_name, offset, ty });
            offset = offset.checked_add(field_size)?;
            align = align.max(field_align);
        }

        Some(TypeClassification::CStruct(StructType {
            name,
            fields,
            size: round_up(offset, align),
            align,
        }))
    }

    fn skip_union(&mut self) -> ParseResult {
        self.pos -= 1;
        self.skip_balanced(b'(', b')')?;
        Ok(TypeClassification::Unknown)
    }

    /// 跳过配对的括号（允许嵌套）
    fn skip_balanced(&mut self, open: u8, close: u8) -> Result<(), Malformed> {
        self.expect(open)?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.next().ok_or(Malformed)? {
                b if b == open => depth += 1,
                b if b == close => depth -= 1,
                _ => {}
            }
        }
        Ok(())
    }

    fn parse_quoted(&mut self) -> Result<String, Malformed> {
        self.expect(b'"')?;
        let start = self.pos;
        while self.peek().ok_or(Malformed)? != b'"' {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).map_err(|_| Malformed)?;
        self.pos += 1;
        Ok(text.to_string())
    }

    fn parse_number(&mut self) -> Option<usize> {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        std::str::from_utf8(&self.bytes[start..self.pos]).ok()?.parse().ok()
    }
}

fn round_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(width: u8, signed: bool) -> TypeClassification {
        TypeClassification::Integer { width, signed }
    }

    #[test]
    fn test_scalars() {
        assert_eq!(resolve("q"), int(64, true));
        assert_eq!(resolve("Q"), int(64, false));
        assert_eq!(resolve("i"), int(32, true));
        assert_eq!(resolve("l"), int(32, true));
        assert_eq!(resolve("S"), int(16, false));
        assert_eq!(resolve("c"), int(8, true));
        assert_eq!(resolve("f"), TypeClassification::FloatingPoint { width: 32 });
        assert_eq!(resolve("d"), TypeClassification::FloatingPoint { width: 64 });
        assert_eq!(resolve("B"), TypeClassification::Boolean);
        assert_eq!(resolve("rq"), int(64, true));
    }

    #[test]
    fn test_objects_and_pointers() {
        assert_eq!(resolve("@"), TypeClassification::ObjCObjectRef { class_name: None });
        assert_eq!(
            resolve("@\"NSString\""),
            TypeClassification::ObjCObjectRef { class_name: Some("NSString".into()) }
        );
        assert_eq!(resolve("#"), TypeClassification::ObjCObjectRef { class_name: None });
        assert_eq!(
            resolve("@?"),
            TypeClassification::Pointer { pointee: Box::new(TypeClassification::Unknown) }
        );
        assert_eq!(
            resolve("^i"),
            TypeClassification::Pointer { pointee: Box::new(int(32, true)) }
        );
        assert_eq!(
            resolve("*"),
            TypeClassification::Pointer { pointee: Box::new(int(8, true)) }
        );
        assert_eq!(
            resolve("^?"),
            TypeClassification::Pointer { pointee: Box::new(TypeClassification::Unknown) }
        );
    }

    #[test]
    fn test_struct_offsets() {
        let ty = resolve("{CGRect={CGPoint=dd}{CGSize=dd}}");
        let TypeClassification::CStruct(rect) = ty else {
            panic!("expected struct");
        };
        assert_eq!(rect.name.as_deref(), Some("CGRect"));
        assert_eq!(rect.size, 32);
        assert_eq!(rect.fields.len(), 2);
        assert_eq!(rect.fields[1].offset, 16);

        let TypeClassification::CStruct(origin) = &rect.fields[0].ty else {
            panic!("expected nested struct");
        };
        assert_eq!(origin.fields[1].offset, 8);
    }

    #[test]
    fn test_struct_padding() {
        let TypeClassification::CStruct(st) = resolve("{Mixed=cqs}") else {
            panic!("expected struct");
        };
        let offsets: Vec<usize> = st.fields.iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 8, 16]);
        assert_eq!(st.size, 24);
        assert_eq!(st.align, 8);
    }

    #[test]
    fn test_named_struct_fields() {
        let TypeClassification::CStruct(st) = resolve("{Node=\"owner\"@\"NSObject\"\"tag\"i}") else {
            panic!("expected struct");
        };
        assert_eq!(st.fields[0].name.as_deref(), Some("owner"));
        assert_eq!(
            st.fields[0].ty,
            TypeClassification::ObjCObjectRef { class_name: Some("NSObject".into()) }
        );
        assert_eq!(st.fields[1].name.as_deref(), Some("tag"));
        assert_eq!(st.fields[1].offset, 8);

        // `@` 后紧跟下一个字段名
        let TypeClassification::CStruct(st) = resolve("{Pair=\"a\"@\"b\"i}") else {
            panic!("expected struct");
        };
        assert_eq!(st.fields[0].ty, TypeClassification::ObjCObjectRef { class_name: None });
        assert_eq!(st.fields[1].name.as_deref(), Some("b"));
    }

    #[test]
    fn test_arrays() {
        assert_eq!(
            resolve("[4i]"),
            TypeClassification::CArray { element: Box::new(int(32, true)), count: 4 }
        );
        assert_eq!(resolve("[3{P=ff}]").size_of(), Some(24));
        assert_eq!(resolve("[i]"), TypeClassification::Unknown);
        assert_eq!(resolve("[2v]"), TypeClassification::Unknown);
    }

    #[test]
    fn test_unknown_inputs() {
        for encoding in ["", "v", ":", "(u=ic)", "{bad=i", "[4i", "qq", " q", "Z", "b3", "{S=ib1}", "@\"NSString"] {
            assert_eq!(resolve(encoding), TypeClassification::Unknown, "encoding {:?}", encoding);
        }
    }

    #[test]
    fn test_opaque_struct() {
        let ty = resolve("^{__CFString=}");
        let TypeClassification::Pointer { pointee } = ty else {
            panic!("expected pointer");
        };
        let TypeClassification::CStruct(st) = *pointee else {
            panic!("expected struct pointee");
        };
        assert!(st.fields.is_empty());
        assert_eq!(st.name.as_deref(), Some("__CFString"));
    }

    #[test]
    fn test_nesting_limit() {
        let deep = "^".repeat(MAX_NESTING_DEPTH + 8) + "i";
        assert_eq!(resolve(&deep), TypeClassification::Unknown);
    }

    #[test]
    fn test_display() {
        assert_eq!(resolve("Q").to_string(), "unsigned long long");
        assert_eq!(resolve("@\"UIView\"").to_string(), "UIView *");
        assert_eq!(resolve("{CGPoint=dd}").to_string(), "struct CGPoint");
        assert_eq!(resolve("[2f]").to_string(), "float[2]");
        assert_eq!(resolve("^v").to_string(), "void *");
    }
}
