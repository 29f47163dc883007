//! Binary operators
//!
//! [`eval_binary`] is the pure value operation, shared with compound
//! assignment and increments. [`step_binary`] evaluates the operands left to
//! right, short-circuiting `&&` and `||`.
//!
//! Arithmetic operands must already have the same type: the AST carries
//! explicit casts for the usual arithmetic conversions, so a mismatch here
//! means the cast is missing and is reported as [`RuntimeError::MixedOperands`].

use crate::interpreter::control::{enter_expr, Acc, Control, Mode, Outcome, Reduction, StepResult};
use crate::interpreter::engine::State;
use crate::interpreter::errors::RuntimeError;
use crate::memory::types::{Scalar, Type, TypeRef};
use crate::memory::value::{PointerValue, Value};
use std::cmp::Ordering;

fn is_relational(op: &str) -> bool {
    matches!(op, "EQ" | "NE" | "LT" | "LE" | "GT" | "GE")
}

/// Apply the binary operator `op` (a clang opcode name) to two values
pub fn eval_binary(op: &str, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match op {
        "LAnd" => return Ok(Value::int((lhs.to_bool() && rhs.to_bool()) as i64)),
        "LOr" => return Ok(Value::int((lhs.to_bool() || rhs.to_bool()) as i64)),
        "Comma" => return Ok(rhs.clone()),
        _ if is_relational(op) => return compare(op, lhs, rhs),
        _ => {}
    }

    match (lhs, rhs) {
        (Value::Integral { scalar, number: a }, Value::Integral { number: b, .. })
            if matches!(op, "Shl" | "Shr") =>
        {
            Ok(shift(op, *scalar, *a, *b))
        }
        (Value::Integral { scalar: ls, number: a }, Value::Integral { scalar: rs, number: b }) => {
            if ls != rs {
                return Err(mixed(op, lhs, rhs));
            }
            integer_arithmetic(op, *ls, *a, *b).ok_or_else(|| unsupported(op, lhs))?
        }
        (Value::Floating { scalar: ls, number: a }, Value::Floating { scalar: rs, number: b }) => {
            if ls != rs {
                return Err(mixed(op, lhs, rhs));
            }
            let number = match op {
                "Add" => a + b,
                "Sub" => a - b,
                "Mul" => a * b,
                "Div" => a / b,
                _ => return Err(unsupported(op, lhs)),
            };
            Ok(Value::floating(*ls, number))
        }
        (Value::Pointer(p), Value::Integral { number, .. }) => match op {
            "Add" => Ok(Value::Pointer(offset(p, *number))),
            "Sub" => Ok(Value::Pointer(offset(p, -*number))),
            _ => Err(unsupported(op, lhs)),
        },
        (Value::Integral { number, .. }, Value::Pointer(p)) if op == "Add" => {
            Ok(Value::Pointer(offset(p, *number)))
        }
        (Value::Pointer(a), Value::Pointer(b)) if op == "Sub" => {
            let distance = a.address as i128 - b.address as i128;
            Ok(Value::integral(Scalar::Int, distance / stride(a) as i128))
        }
        (Value::Integral { .. }, Value::Floating { .. })
        | (Value::Floating { .. }, Value::Integral { .. }) => Err(mixed(op, lhs, rhs)),
        _ => Err(unsupported(op, lhs)),
    }
}

fn integer_arithmetic(op: &str, scalar: Scalar, a: i128, b: i128) -> Option<Result<Value, RuntimeError>> {
    let number = match op {
        "Add" => a.wrapping_add(b),
        "Sub" => a.wrapping_sub(b),
        "Mul" => a.wrapping_mul(b),
        "Div" | "Rem" if b == 0 => {
            return Some(Err(RuntimeError::DivisionByZero { op: op.to_string() }))
        }
        "Div" => a / b,
        "Rem" => a % b,
        "And" => a & b,
        "Or" => a | b,
        "Xor" => a ^ b,
        _ => return None,
    };
    Some(Ok(Value::integral(scalar, number)))
}

// Shifts by a negative amount or past the width saturate instead of
// wrapping the shift count.
fn shift(op: &str, scalar: Scalar, a: i128, b: i128) -> Value {
    let in_range = (0..scalar.bits() as i128).contains(&b);
    let number = match (op, in_range) {
        ("Shl", true) => a << b,
        ("Shl", false) => 0,
        (_, true) => a >> b,
        (_, false) => {
            if a < 0 {
                -1
            } else {
                0
            }
        }
    };
    Value::integral(scalar, number)
}

/// Pointee size used for pointer arithmetic; `void*` steps by bytes
fn stride(p: &PointerValue) -> usize {
    p.size().max(1)
}

fn offset(p: &PointerValue, count: i128) -> PointerValue {
    p.offset_bytes(count * stride(p) as i128)
}

fn compare(op: &str, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    let ordering = match (lhs, rhs) {
        (Value::Floating { number: a, .. }, Value::Floating { number: b, .. }) => a.partial_cmp(b),
        (Value::Floating { .. }, _) | (_, Value::Floating { .. }) => return Err(mixed(op, lhs, rhs)),
        _ => match (lhs.to_integer(), rhs.to_integer()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => return Err(unsupported(op, lhs)),
        },
    };
    let holds = match ordering {
        // NaN: only != holds
        None => op == "NE",
        Some(ordering) => match op {
            "EQ" => ordering == Ordering::Equal,
            "NE" => ordering != Ordering::Equal,
            "LT" => ordering == Ordering::Less,
            "LE" => ordering != Ordering::Greater,
            "GT" => ordering == Ordering::Greater,
            _ => ordering != Ordering::Less,
        },
    };
    Ok(Value::int(holds as i64))
}

fn mixed(op: &str, lhs: &Value, rhs: &Value) -> RuntimeError {
    RuntimeError::MixedOperands {
        op: op.to_string(),
        lhs: lhs.ty().to_string(),
        rhs: rhs.ty().to_string(),
    }
}

fn unsupported(op: &str, operand: &Value) -> RuntimeError {
    RuntimeError::UnsupportedOperation {
        op: op.to_string(),
        operand: operand.ty().to_string(),
    }
}

/// Static type of `lhs op rhs`
fn result_type(op: &str, lhs: &TypeRef, rhs: &TypeRef) -> TypeRef {
    match (&**lhs, &**rhs) {
        _ if is_relational(op) || matches!(op, "LAnd" | "LOr") => Type::int(),
        _ if op == "Comma" => rhs.clone(),
        (Type::Pointer(_), Type::Pointer(_)) if op == "Sub" => Type::int(),
        (_, Type::Pointer(_)) if !matches!(&**lhs, Type::Pointer(_)) => rhs.clone(),
        _ => lhs.clone(),
    }
}

/// Steps: 0 left operand, 1 right operand (or short-circuit), 2 combine
pub fn step_binary(state: &State, control: &Control) -> StepResult {
    let node = &control.node;
    let op = node.attr_str("opcode").unwrap_or_default();
    let operand = |index: usize| {
        node.child(index)
            .ok_or_else(|| RuntimeError::invalid(&node.kind, "missing operand"))
    };

    if control.mode == Mode::Type {
        return match (control.index(), &control.acc) {
            (0, _) => Ok(Reduction::to(enter_expr(operand(0)?, control.at(1)).with_mode(Mode::Type))),
            (1, _) => {
                let lhs = state.type_result(control)?;
                let next = control.at(2).with_acc(Acc::Type(lhs));
                Ok(Reduction::to(enter_expr(operand(1)?, next).with_mode(Mode::Type)))
            }
            (_, Acc::Type(lhs)) => {
                let rhs = state.type_result(control)?;
                Ok(Reduction::done(&control.cont, Outcome::Type(result_type(&op, lhs, &rhs))))
            }
            _ => Err(RuntimeError::invalid(&node.kind, "lost the left operand type")),
        };
    }

    match control.index() {
        0 => Ok(Reduction::to(enter_expr(operand(0)?, control.at(1)))),
        1 => {
            let lhs = state.value(control)?;
            match (op.as_str(), lhs.to_bool()) {
                ("LAnd", false) => Ok(Reduction::value(&control.cont, Value::int(0))),
                ("LOr", true) => Ok(Reduction::value(&control.cont, Value::int(1))),
                _ => Ok(Reduction::to(enter_expr(
                    operand(1)?,
                    control.at(2).with_acc(Acc::Lhs(lhs)),
                ))),
            }
        }
        _ => {
            let Acc::Lhs(lhs) = &control.acc else {
                return Err(RuntimeError::invalid(&node.kind, "lost the left operand"));
            };
            let rhs = state.value(control)?;
            let value = eval_binary(&op, lhs, &rhs)?;
            Ok(Reduction::value(&control.cont, value))
        }
    }
}
