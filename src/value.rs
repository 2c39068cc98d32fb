//! 运行时值模型：读取/写入属性时在编辑器与运行时之间传递的值

use crate::encoding::TypeClassification;
use std::fmt;

/// 对象引用
///
/// 只按地址比较：类名仅用于显示，同一地址即同一对象。
#[derive(Debug, Clone, Eq)]
pub struct ObjectRef {
    /// 对象地址，0 表示 nil
    pub address: usize,
    /// 运行时类名（未知时为 None）
    pub class_name: Option<String>,
}

impl ObjectRef {
    pub fn nil() -> Self {
        Self { address: 0, class_name: None }
    }

    pub fn new(address: usize, class_name: impl Into<String>) -> Self {
        Self { address, class_name: Some(class_name.into()) }
    }

    pub fn is_nil(&self) -> bool {
        self.address == 0
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl fmt::Display for ObjectRef {
    /// NSObject 风格描述：`<ClassName: 0xADDR>`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.class_name, self.address) {
            (_, 0) => write!(f, "nil"),
            (Some(name), address) => write!(f, "<{}: 0x{:x}>", name, address),
            (None, address) => write!(f, "0x{:x}", address),
        }
    }
}

/// 属性的原生值
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Object(ObjectRef),
    /// 原始指针地址
    Pointer(usize),
    /// 按字段顺序排列的结构体值
    Struct(Vec<Value>),
    Array(Vec<Value>),
}

impl Value {
    /// 值的形状是否符合类型
    ///
    /// 标量只检查形状和取值范围，结构体/数组递归检查。
    pub fn conforms_to(&self, ty: &TypeClassification) -> bool {
        match (self, ty) {
            (Value::Int(v), TypeClassification::Integer { width, signed: true }) => {
                let (min, max) = signed_range(*width);
                (*v as i128) >= min && (*v as i128) <= max
            }
            (Value::UInt(v), TypeClassification::Integer { width, signed: false }) => {
                (*v as u128) <= unsigned_max(*width)
            }
            (Value::Float(_), TypeClassification::FloatingPoint { .. }) => true,
            (Value::Bool(_), TypeClassification::Boolean) => true,
            (Value::Object(_), TypeClassification::ObjCObjectRef { .. }) => true,
            (Value::Pointer(_), TypeClassification::Pointer { .. }) => true,
            (Value::Struct(values), TypeClassification::CStruct(st)) => {
                values.len() == st.fields.len()
                    && values.iter().zip(&st.fields).all(|(v, f)| v.conforms_to(&f.ty))
            }
            (Value::Array(values), TypeClassification::CArray { element, count }) => {
                values.len() == *count && values.iter().all(|v| v.conforms_to(element))
            }
            _ => false,
        }
    }

    /// 简短的形状名称（用于错误信息）
    pub fn shape_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "signed integer",
            Value::UInt(_) => "unsigned integer",
            Value::Float(_) => "floating point",
            Value::Bool(_) => "boolean",
            Value::Object(_) => "object reference",
            Value::Pointer(_) => "pointer",
            Value::Struct(_) => "struct",
            Value::Array(_) => "array",
        }
    }
}

/// 有符号整数的取值范围
pub fn signed_range(width: u8) -> (i128, i128) {
    let bits = width.clamp(1, 64) as u32;
    (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
}

/// 无符号整数的最大值
pub fn unsigned_max(width: u8) -> u128 {
    let bits = width.clamp(1, 64) as u32;
    (1u128 << bits) - 1
}
