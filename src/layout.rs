//! 值的内存布局读写
//!
//! 按 [`TypeClassification`] 给出的大小与字段偏移，在小端字节缓冲区与 [`Value`] 之间转换。
//! 快照运行时用它模拟实例变量的真实存储。

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Write};
use thiserror::Error;

use crate::encoding::TypeClassification;
use crate::value::{ObjectRef, Value};

/// 布局错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Type {0} has no known memory layout")]
    NoLayout(String),

    #[error("Buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("Value of shape {shape} does not fit type {ty}")]
    ShapeMismatch { shape: &'static str, ty: String },
}

/// 从缓冲区起始处读取一个值
pub fn read_value(ty: &TypeClassification, bytes: &[u8]) -> Result<Value, LayoutError> {
    let size = ty.size_of().ok_or_else(|| LayoutError::NoLayout(ty.to_string()))?;
    if bytes.len() < size {
        return Err(LayoutError::BufferTooSmall { needed: size, available: bytes.len() });
    }

    let mut cursor = Cursor::new(&bytes[..size]);
    // 长度已校验，以下读取不会越界
    let io = |_: std::io::Error| LayoutError::BufferTooSmall { needed: size, available: bytes.len() };

    let value = match ty {
        TypeClassification::Integer { width, signed: true } => Value::Int(match width {
            8 => cursor.read_i8().map_err(io)? as i64,
            16 => cursor.read_i16::<LittleEndian>().map_err(io)? as i64,
            32 => cursor.read_i32::<LittleEndian>().map_err(io)? as i64,
            _ => cursor.read_i64::<LittleEndian>().map_err(io)?,
        }),
        TypeClassification::Integer { width, signed: false } => Value::UInt(match width {
            8 => cursor.read_u8().map_err(io)? as u64,
            16 => cursor.read_u16::<LittleEndian>().map_err(io)? as u64,
            32 => cursor.read_u32::<LittleEndian>().map_err(io)? as u64,
            _ => cursor.read_u64::<LittleEndian>().map_err(io)?,
        }),
        TypeClassification::FloatingPoint { width: 32 } => {
            Value::Float(cursor.read_f32::<LittleEndian>().map_err(io)? as f64)
        }
        TypeClassification::FloatingPoint { .. } => {
            Value::Float(cursor.read_f64::<LittleEndian>().map_err(io)?)
        }
        TypeClassification::Boolean => Value::Bool(cursor.read_u8().map_err(io)? != 0),
        TypeClassification::ObjCObjectRef { .. } => Value::Object(ObjectRef {
            address: cursor.read_u64::<LittleEndian>().map_err(io)? as usize,
            class_name: None,
        }),
        TypeClassification::Pointer { .. } => {
            Value::Pointer(cursor.read_u64::<LittleEndian>().map_err(io)? as usize)
        }
        TypeClassification::CStruct(st) => Value::Struct(
            st.fields
                .iter()
                .map(|field| read_value(&field.ty, &bytes[field.offset..]))
                .collect::<Result<_, _>>()?,
        ),
        TypeClassification::CArray { element, count } => {
            let stride = element.size_of().ok_or_else(|| LayoutError::NoLayout(element.to_string()))?;
            Value::Array(
                (0..*count)
                    .map(|i| read_value(element, &bytes[i * stride..]))
                    .collect::<Result<_, _>>()?,
            )
        }
        TypeClassification::Unknown => return Err(LayoutError::NoLayout(ty.to_string())),
    };

    Ok(value)
}

/// 将值编码为该类型大小的新缓冲区
///
/// 先完整编码再返回，调用方可以原子地替换旧存储。
pub fn encode_value(ty: &TypeClassification, value: &Value) -> Result<Vec<u8>, LayoutError> {
    let size = ty.size_of().ok_or_else(|| LayoutError::NoLayout(ty.to_string()))?;
    let mut buffer = vec![0u8; size];
    write_value(ty, value, &mut buffer)?;
    Ok(buffer)
}

/// 将值写入缓冲区起始处
pub fn write_value(ty: &TypeClassification, value: &Value, out: &mut [u8]) -> Result<(), LayoutError> {
    let size = ty.size_of().ok_or_else(|| LayoutError::NoLayout(ty.to_string()))?;
    if out.len() < size {
        return Err(LayoutError::BufferTooSmall { needed: size, available: out.len() });
    }
    if !value.conforms_to(ty) {
        return Err(LayoutError::ShapeMismatch { shape: value.shape_name(), ty: ty.to_string() });
    }

    match (ty, value) {
        (TypeClassification::CStruct(st), Value::Struct(values)) => {
            for (field, field_value) in st.fields.iter().zip(values) {
                write_value(&field.ty, field_value, &mut out[field.offset..])?;
            }
            Ok(())
        }
        (TypeClassification::CArray { element, .. }, Value::Array(values)) => {
            let stride = element.size_of().ok_or_else(|| LayoutError::NoLayout(element.to_string()))?;
            for (i, element_value) in values.iter().enumerate() {
                write_value(element, element_value, &mut out[i * stride..])?;
            }
            Ok(())
        }
        _ => write_scalar(ty, value, &mut out[..size]),
    }
}

fn write_scalar(ty: &TypeClassification, value: &Value, out: &mut [u8]) -> Result<(), LayoutError> {
    let mut writer: &mut [u8] = out;
    let io = |_: std::io::Error| LayoutError::BufferTooSmall { needed: ty.size_of().unwrap_or(0), available: 0 };

    let written = match (ty, value) {
        (TypeClassification::Integer { width, .. }, Value::Int(v)) => write_int(&mut writer, *width, *v as u64),
        (TypeClassification::Integer { width, .. }, Value::UInt(v)) => write_int(&mut writer, *width, *v),
        (TypeClassification::FloatingPoint { width: 32 }, Value::Float(v)) => {
            writer.write_f32::<LittleEndian>(*v as f32)
        }
        (TypeClassification::FloatingPoint { .. }, Value::Float(v)) => writer.write_f64::<LittleEndian>(*v),
        (TypeClassification::Boolean, Value::Bool(v)) => writer.write_u8(u8::from(*v)),
        (TypeClassification::ObjCObjectRef { .. }, Value::Object(obj)) => {
            writer.write_u64::<LittleEndian>(obj.address as u64)
        }
        (TypeClassification::Pointer { .. }, Value::Pointer(address)) => {
            writer.write_u64::<LittleEndian>(*address as u64)
        }
        _ => {
            return Err(LayoutError::ShapeMismatch { shape: value.shape_name(), ty: ty.to_string() });
        }
    };

    written.map_err(io)
}

/// 按宽度截断写入（补码表示对有符号与无符号一致）
fn write_int(writer: &mut dyn Write, width: u8, bits: u64) -> std::io::Result<()> {
    match width {
        8 => writer.write_all(&[bits as u8]),
        16 => writer.write_all(&(bits as u16).to_le_bytes()),
        32 => writer.write_all(&(bits as u32).to_le_bytes()),
        _ => writer.write_all(&bits.to_le_bytes()),
    }
}
