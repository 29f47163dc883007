use crate::interpreter::errors::RuntimeError;
use crate::memory::types::{PointerType, Type, TypeRef};
use crate::memory::value::{wrap_address, PointerValue, Value};

/// Convert `value` to `ty`
///
/// Integer targets truncate (wrap) to their width, floating sources
/// truncate toward zero. Callables pass through pointer targets unchanged,
/// since a function designator and a pointer to it are the same value.
pub fn eval_cast(ty: &TypeRef, value: &Value) -> Result<Value, RuntimeError> {
    let unsupported = || RuntimeError::UnsupportedCast {
        from: value.ty().to_string(),
        to: ty.to_string(),
    };
    match &**ty {
        Type::Scalar(scalar) if scalar.is_floating() => match value {
            Value::Integral { number, .. } => Ok(Value::floating(*scalar, *number as f64)),
            Value::Floating { number, .. } => Ok(Value::floating(*scalar, *number)),
            _ => Err(unsupported()),
        },
        Type::Scalar(scalar) => value
            .to_integer()
            .map(|number| Value::integral(*scalar, number))
            .ok_or_else(unsupported),
        Type::Pointer(pointer) => match value {
            Value::Function(_) | Value::Builtin(_) => Ok(value.clone()),
            Value::Pointer(p) => Ok(Value::Pointer(PointerValue {
                ty: retarget(pointer, p),
                address: p.address,
            })),
            Value::Integral { number, .. } => Ok(Value::Pointer(PointerValue {
                ty: pointer.clone(),
                address: wrap_address(*number, pointer.size()),
            })),
            _ => Err(unsupported()),
        },
        Type::Array(_) | Type::Record(_) | Type::Function(_) if value.ty() == *ty => Ok(value.clone()),
        _ => Err(unsupported()),
    }
}

// A no-op cast keeps the decay origin, which sizeof and display still use.
fn retarget(target: &PointerType, source: &PointerValue) -> PointerType {
    if target.pointee == source.ty.pointee {
        source.ty.clone()
    } else {
        target.clone()
    }
}
