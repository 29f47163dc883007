//! Runtime value representation
//!
//! This module defines the [`Value`] enum. Every value carries the type that
//! produced it, so it can be packed to exactly `ty().size()` bytes and
//! unpacked back (see [`serial`](super::serial)).
//!
//! # Value Types
//!
//! - [`Value::Integral`]: integer scalar, stored wrapped to the type's width
//! - [`Value::Floating`]: float or double, `float` rounded to single precision
//! - [`Value::Pointer`]: typed address; also used as the reference to a variable
//! - [`Value::Array`] / [`Value::Record`]: composite values
//! - [`Value::Function`] / [`Value::Builtin`]: callables, identified by their
//!   index in the function table

use super::types::{FunctionType, PointerType, RecordDecl, Scalar, Type, TypeRef};
use crate::ast::Node;
use crate::interpreter::builtins::NativeFunction;
use crate::interpreter::errors::RuntimeError;
use rustc_hash::FxHashMap;
use std::fmt;
use std::rc::Rc;

/// Memory address type
pub type Address = u64;

/// Runtime values in the interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integral { scalar: Scalar, number: i128 },
    Floating { scalar: Scalar, number: f64 },
    Pointer(PointerValue),
    Array { elem: TypeRef, elements: Vec<Value> },
    Record {
        decl: Rc<RecordDecl>,
        fields: FxHashMap<String, Value>, // Field name -> field value
    },
    Function(Rc<FunctionValue>),
    Builtin(Rc<BuiltinValue>),
}

/// A typed address
#[derive(Debug, Clone, PartialEq)]
pub struct PointerValue {
    pub ty: PointerType,
    pub address: Address,
}

/// Reduce `address` modulo the range of a `size`-byte pointer
pub fn wrap_address(address: i128, size: usize) -> Address {
    address.rem_euclid(1i128 << (size * 8)) as Address
}

impl PointerValue {
    pub fn new(pointee: TypeRef, address: Address) -> Self {
        PointerValue {
            ty: PointerType::new(pointee),
            address,
        }
    }

    pub fn pointee(&self) -> &TypeRef {
        &self.ty.pointee
    }

    /// The same reference moved by `bytes`, wrapped to the pointer width
    pub fn offset_bytes(&self, bytes: i128) -> PointerValue {
        PointerValue {
            ty: self.ty.clone(),
            address: wrap_address(self.address as i128 + bytes, self.ty.size()),
        }
    }

    /// Reference to the first element of an array at the same address
    pub fn decayed(&self) -> PointerValue {
        match &*self.ty.pointee {
            Type::Array(array) => PointerValue {
                ty: PointerType {
                    pointee: array.elem.clone(),
                    orig: Some(self.ty.pointee.clone()),
                },
                address: self.address,
            },
            _ => self.clone(),
        }
    }

    /// Number of bytes addressed
    pub fn size(&self) -> usize {
        self.ty.pointee.size()
    }
}

/// A function defined in the program
#[derive(Debug)]
pub struct FunctionValue {
    pub name: String,
    /// Index in the function table
    pub code: usize,
    pub ty: FunctionType,
    pub body: Rc<Node>,
    pub decl: Rc<Node>,
}

impl PartialEq for FunctionValue {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code && self.name == other.name
    }
}

/// A function implemented by the host
pub struct BuiltinValue {
    pub name: String,
    pub code: usize,
    pub ty: FunctionType,
    pub native: Rc<dyn NativeFunction>,
}

impl PartialEq for BuiltinValue {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code && self.name == other.name
    }
}

impl fmt::Debug for BuiltinValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinValue")
            .field("name", &self.name)
            .field("code", &self.code)
            .finish_non_exhaustive()
    }
}

/// Wrap `number` to the width and signedness of `scalar`
fn wrap(scalar: Scalar, number: i128) -> i128 {
    let bits = scalar.bits();
    let modulus = 1i128 << bits;
    let value = number.rem_euclid(modulus);
    if scalar.is_signed() && value >= modulus >> 1 {
        value - modulus
    } else {
        value
    }
}

impl Value {
    /// Integral value of the given scalar type, wrapped to its width
    ///
    /// A floating scalar produces a floating value instead.
    pub fn integral(scalar: Scalar, number: i128) -> Value {
        if scalar.is_floating() {
            return Value::floating(scalar, number as f64);
        }
        Value::Integral {
            scalar,
            number: wrap(scalar, number),
        }
    }

    pub fn floating(scalar: Scalar, number: f64) -> Value {
        let number = if scalar.size() == 4 {
            number as f32 as f64
        } else {
            number
        };
        Value::Floating { scalar, number }
    }

    pub fn int(number: i64) -> Value {
        Value::integral(Scalar::Int, number as i128)
    }

    pub fn null(pointee: TypeRef) -> Value {
        Value::Pointer(PointerValue::new(pointee, 0))
    }

    /// The type that produced this value
    pub fn ty(&self) -> TypeRef {
        match self {
            Value::Integral { scalar, .. } | Value::Floating { scalar, .. } => {
                Type::scalar(*scalar)
            }
            Value::Pointer(p) => Rc::new(Type::Pointer(p.ty.clone())),
            Value::Array { elem, elements } => Type::array_of(elem.clone(), Some(elements.len())),
            Value::Record { decl, .. } => Rc::new(Type::Record(decl.clone())),
            Value::Function(func) => Rc::new(Type::Function(func.ty.clone())),
            Value::Builtin(builtin) => Rc::new(Type::Function(builtin.ty.clone())),
        }
    }

    pub fn to_bool(&self) -> bool {
        match self {
            Value::Integral { number, .. } => *number != 0,
            Value::Floating { number, .. } => *number != 0.0,
            Value::Pointer(p) => p.address != 0,
            Value::Function(_) | Value::Builtin(_) => true,
            Value::Array { .. } | Value::Record { .. } => true,
        }
    }

    /// Integer interpretation: floats truncate toward zero, pointers yield
    /// their address, callables their code index
    pub fn to_integer(&self) -> Option<i128> {
        match self {
            Value::Integral { number, .. } => Some(*number),
            Value::Floating { number, .. } => Some(number.trunc() as i128),
            Value::Pointer(p) => Some(p.address as i128),
            Value::Function(func) => Some(func.code as i128),
            Value::Builtin(builtin) => Some(builtin.code as i128),
            Value::Array { .. } | Value::Record { .. } => None,
        }
    }

    pub fn as_pointer(&self) -> Option<&PointerValue> {
        match self {
            Value::Pointer(p) => Some(p),
            _ => None,
        }
    }

    /// Name of the callable, if this value is one
    pub fn callee_name(&self) -> Option<&str> {
        match self {
            Value::Function(func) => Some(&func.name),
            Value::Builtin(builtin) => Some(&builtin.name),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integral {
                scalar: Scalar::Char,
                number,
            } => match *number {
                0 => write!(f, "'\\0'"),
                9 => write!(f, "'\\t'"),
                10 => write!(f, "'\\n'"),
                13 => write!(f, "'\\r'"),
                39 => write!(f, "'\\''"),
                92 => write!(f, "'\\\\'"),
                n @ 32..=126 => write!(f, "'{}'", n as u8 as char),
                n => write!(f, "'\\x{:02x}'", n.rem_euclid(256)),
            },
            Value::Integral { number, .. } => write!(f, "{}", number),
            Value::Floating { number, .. } => {
                let text = format!("{:.6}", number);
                let text = text.trim_end_matches('0').trim_end_matches('.');
                write!(f, "{}", text)
            }
            Value::Pointer(p) => write!(f, "0x{:x}", p.address),
            Value::Array { elements, .. } => {
                write!(f, "{{")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", elem)?;
                }
                write!(f, "}}")
            }
            Value::Record { decl, fields } => {
                write!(f, "{{")?;
                let mut first = true;
                for field in decl.layout().map(|l| l.fields.as_slice()).unwrap_or(&[]) {
                    if let Some(value) = fields.get(&field.name) {
                        if !first {
                            write!(f, ", ")?;
                        }
                        first = false;
                        write!(f, ".{} = {}", field.name, value)?;
                    }
                }
                write!(f, "}}")
            }
            Value::Function(func) => write!(f, "{}", func.name),
            Value::Builtin(builtin) => write!(f, "{}", builtin.name),
        }
    }
}

/// The default-initialized value of a complete type
pub fn zero_value(ty: &TypeRef) -> Result<Value, RuntimeError> {
    match &**ty {
        Type::Scalar(s) if s.is_floating() => Ok(Value::floating(*s, 0.0)),
        Type::Scalar(s) => Ok(Value::integral(*s, 0)),
        Type::Pointer(p) => Ok(Value::Pointer(PointerValue {
            ty: p.clone(),
            address: 0,
        })),
        Type::Array(array) => match array.count {
            Some(count) => {
                let zero = zero_value(&array.elem)?;
                Ok(Value::Array {
                    elem: array.elem.clone(),
                    elements: vec![zero; count],
                })
            }
            None => Err(RuntimeError::IncompleteType { ty: ty.to_string() }),
        },
        Type::Record(decl) => {
            let layout = decl
                .layout()
                .ok_or_else(|| RuntimeError::IncompleteType { ty: ty.to_string() })?;
            let mut fields = FxHashMap::default();
            for field in &layout.fields {
                fields.insert(field.name.clone(), zero_value(&field.ty)?);
            }
            Ok(Value::Record {
                decl: decl.clone(),
                fields,
            })
        }
        Type::Void | Type::Function(_) => Err(RuntimeError::IncompleteType { ty: ty.to_string() }),
    }
}

/// An initializer: a single value or a (possibly nested) brace list
#[derive(Debug, Clone, PartialEq)]
pub enum Init {
    Value(Value),
    List(Vec<Init>),
}

impl Init {
    /// Shape of a nested list, outermost dimension first
    ///
    /// `{{1, 2, 3}, {4}}` has dims `[2, 3]`.
    pub fn dims(&self) -> Vec<usize> {
        let mut dims = Vec::new();
        let mut level = vec![self];
        while level.iter().any(|init| matches!(init, Init::List(_))) {
            let mut width = 0;
            let mut next = Vec::new();
            for init in &level {
                if let Init::List(items) = init {
                    width = width.max(items.len());
                    next.extend(items.iter());
                }
            }
            dims.push(width);
            level = next;
        }
        dims
    }
}
