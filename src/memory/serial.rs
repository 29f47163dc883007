//! Packing values to bytes and back
//!
//! [`pack`] writes exactly `value.ty().size()` bytes and [`unpack`] reads the
//! same number back. Arrays are laid out element by element at the element
//! size, records field by field at their offsets. Callables are stored as
//! their function-table index at function-pointer width.

use super::types::{Scalar, Type, TypeRef};
use super::value::{PointerValue, Value};
use crate::interpreter::constants::FUNCTION_POINTER_SIZE;
use crate::interpreter::errors::RuntimeError;
use rustc_hash::FxHashMap;
use serde::Deserialize;

/// Byte order of multi-byte scalars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

fn slot(buf: &mut [u8], offset: usize, size: usize) -> Result<&mut [u8], RuntimeError> {
    let len = buf.len();
    offset
        .checked_add(size)
        .filter(|end| *end <= len)
        .map(move |end| &mut buf[offset..end])
        .ok_or(RuntimeError::MemoryFault {
            address: offset as u64,
            size,
        })
}

fn bytes(buf: &[u8], offset: usize, size: usize) -> Result<&[u8], RuntimeError> {
    offset
        .checked_add(size)
        .and_then(|end| buf.get(offset..end))
        .ok_or(RuntimeError::MemoryFault {
            address: offset as u64,
            size,
        })
}

/// Low `size` bytes of a two's complement integer
fn put_int(buf: &mut [u8], offset: usize, size: usize, number: i128, endian: Endianness) -> Result<(), RuntimeError> {
    let dest = slot(buf, offset, size)?;
    match endian {
        Endianness::Little => dest.copy_from_slice(&number.to_le_bytes()[..size]),
        Endianness::Big => dest.copy_from_slice(&number.to_be_bytes()[16 - size..]),
    }
    Ok(())
}

/// Zero-extended integer from `size` bytes
fn get_int(buf: &[u8], offset: usize, size: usize, endian: Endianness) -> Result<u128, RuntimeError> {
    let src = bytes(buf, offset, size)?;
    let mut wide = [0u8; 16];
    Ok(match endian {
        Endianness::Little => {
            wide[..size].copy_from_slice(src);
            u128::from_le_bytes(wide)
        }
        Endianness::Big => {
            wide[16 - size..].copy_from_slice(src);
            u128::from_be_bytes(wide)
        }
    })
}

/// Serialize `value` into `buf` at `offset`
pub fn pack(value: &Value, buf: &mut [u8], offset: usize, endian: Endianness) -> Result<(), RuntimeError> {
    match value {
        Value::Integral { scalar, number } => put_int(buf, offset, scalar.size(), *number, endian),
        Value::Floating { scalar, number } => {
            let dest = slot(buf, offset, scalar.size())?;
            match (scalar.size(), endian) {
                (4, Endianness::Little) => dest.copy_from_slice(&(*number as f32).to_le_bytes()),
                (4, Endianness::Big) => dest.copy_from_slice(&(*number as f32).to_be_bytes()),
                (_, Endianness::Little) => dest.copy_from_slice(&number.to_le_bytes()),
                (_, Endianness::Big) => dest.copy_from_slice(&number.to_be_bytes()),
            }
            Ok(())
        }
        Value::Pointer(p) => put_int(buf, offset, p.ty.size(), p.address as i128, endian),
        Value::Array { elem, elements } => {
            let stride = elem.size();
            for (index, element) in elements.iter().enumerate() {
                pack(element, buf, offset + index * stride, endian)?;
            }
            Ok(())
        }
        Value::Record { decl, fields } => {
            let layout = decl.layout().ok_or_else(|| RuntimeError::IncompleteType {
                ty: format!("struct {}", decl.name),
            })?;
            for field in &layout.fields {
                if let Some(value) = fields.get(&field.name) {
                    pack(value, buf, offset + field.offset, endian)?;
                }
            }
            Ok(())
        }
        Value::Function(func) => put_int(buf, offset, FUNCTION_POINTER_SIZE, func.code as i128, endian),
        Value::Builtin(builtin) => put_int(buf, offset, FUNCTION_POINTER_SIZE, builtin.code as i128, endian),
    }
}

/// Deserialize a value of type `ty` from `buf` at `offset`
pub fn unpack(ty: &TypeRef, buf: &[u8], offset: usize, endian: Endianness) -> Result<Value, RuntimeError> {
    match &**ty {
        Type::Scalar(Scalar::Float) => {
            let raw = get_int(buf, offset, 4, endian)? as u32;
            Ok(Value::floating(Scalar::Float, f32::from_bits(raw) as f64))
        }
        Type::Scalar(Scalar::Double) => {
            let raw = get_int(buf, offset, 8, endian)? as u64;
            Ok(Value::floating(Scalar::Double, f64::from_bits(raw)))
        }
        Type::Scalar(scalar) => {
            let raw = get_int(buf, offset, scalar.size(), endian)?;
            Ok(Value::integral(*scalar, raw as i128))
        }
        Type::Pointer(p) => {
            let address = get_int(buf, offset, p.size(), endian)? as u64;
            Ok(Value::Pointer(PointerValue {
                ty: p.clone(),
                address,
            }))
        }
        Type::Array(array) => {
            let count = array
                .count
                .ok_or_else(|| RuntimeError::IncompleteType { ty: ty.to_string() })?;
            let stride = array.elem.size();
            let elements = (0..count)
                .map(|index| unpack(&array.elem, buf, offset + index * stride, endian))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array {
                elem: array.elem.clone(),
                elements,
            })
        }
        Type::Record(decl) => {
            let layout = decl
                .layout()
                .ok_or_else(|| RuntimeError::IncompleteType { ty: ty.to_string() })?;
            let mut fields = FxHashMap::default();
            for field in &layout.fields {
                fields.insert(field.name.clone(), unpack(&field.ty, buf, offset + field.offset, endian)?);
            }
            Ok(Value::Record {
                decl: decl.clone(),
                fields,
            })
        }
        Type::Void => Err(RuntimeError::IncompleteType { ty: ty.to_string() }),
        Type::Function(_) => Err(RuntimeError::UnsupportedOperation {
            op: "read".to_string(),
            operand: ty.to_string(),
        }),
    }
}
