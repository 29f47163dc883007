//! Assignment, compound assignment, and `++`/`--`
//!
//! The target is evaluated first, as an lvalue. Every form ends in a
//! `Store` effect through that reference; the compound forms and the
//! increments also log the `Load` of the old value.

use super::binary::eval_binary;
use super::cast::eval_cast;
use crate::ast::Node;
use crate::interpreter::control::{enter_expr, Acc, Control, Mode, Outcome, Reduction, StepResult};
use crate::interpreter::effects::{coerce, Effect};
use crate::interpreter::engine::State;
use crate::interpreter::errors::RuntimeError;
use crate::memory::types::{Scalar, TypeRef};
use crate::memory::value::{PointerValue, Value};
use std::rc::Rc;

fn target_reference(state: &State, control: &Control) -> Result<PointerValue, RuntimeError> {
    match state.value(control)? {
        Value::Pointer(reference) => Ok(reference),
        other => Err(RuntimeError::invalid(
            &control.node.kind,
            format!("cannot assign to {}", other.ty()),
        )),
    }
}

fn operand(control: &Control, index: usize) -> Result<&Rc<Node>, RuntimeError> {
    control
        .node
        .child(index)
        .ok_or_else(|| RuntimeError::invalid(&control.node.kind, "missing operand"))
}

/// Type mode for every assignment form: the type of the target
fn target_type(state: &State, control: &Control) -> StepResult {
    if control.index() == 0 {
        let target = operand(control, 0)?;
        return Ok(Reduction::to(enter_expr(target, control.at(1)).with_mode(Mode::Type)));
    }
    Ok(Reduction::done(&control.cont, Outcome::Type(state.type_result(control)?)))
}

/// `lhs = rhs`
///
/// Steps: 0 target, 1 value, 2 store.
pub fn step_assign(state: &State, control: &Control) -> StepResult {
    if control.mode == Mode::Type {
        return target_type(state, control);
    }
    match control.index() {
        0 => Ok(Reduction::to(enter_expr(operand(control, 0)?, control.at(1)).with_mode(Mode::Lvalue))),
        1 => {
            let reference = target_reference(state, control)?;
            let next = control.at(2).with_acc(Acc::Lvalue { reference, lhs: None });
            Ok(Reduction::to(enter_expr(operand(control, 1)?, next)))
        }
        _ => {
            let Acc::Lvalue { reference, .. } = &control.acc else {
                return Err(RuntimeError::invalid(&control.node.kind, "lost the target"));
            };
            let value = coerce(reference.pointee(), state.value(control)?)?;
            Ok(Reduction::value(&control.cont, value.clone())
                .with_effect(Effect::Store(reference.clone(), value)))
        }
    }
}

/// Type the arithmetic of `lhs op= rhs` is carried out in
///
/// The right operand's type, unless only the left operand is floating.
fn computation_type(lhs: &Value, rhs: &Value) -> TypeRef {
    match (lhs, rhs) {
        (Value::Floating { scalar: l, .. }, Value::Floating { scalar: r, .. }) => {
            if l.size() >= r.size() {
                lhs.ty()
            } else {
                rhs.ty()
            }
        }
        (Value::Floating { .. }, _) => lhs.ty(),
        _ => rhs.ty(),
    }
}

/// Evaluate `lhs op= rhs` to the value stored back into the target
///
/// Shifts keep the target's type whatever the type of the count.
pub fn eval_compound(op: &str, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    if matches!(lhs, Value::Pointer(_)) || matches!(op, "Shl" | "Shr") || lhs.ty() == rhs.ty() {
        return eval_binary(op, lhs, rhs);
    }
    let ty = computation_type(lhs, rhs);
    let result = eval_binary(op, &eval_cast(&ty, lhs)?, &eval_cast(&ty, rhs)?)?;
    eval_cast(&lhs.ty(), &result)
}

/// `lhs op= rhs`, with `op` taken from the opcode (`AddAssign` is `Add`)
///
/// Steps: 0 target, 1 load and value, 2 store.
pub fn step_compound_assign(state: &State, control: &Control) -> StepResult {
    if control.mode == Mode::Type {
        return target_type(state, control);
    }
    match control.index() {
        0 => Ok(Reduction::to(enter_expr(operand(control, 0)?, control.at(1)).with_mode(Mode::Lvalue))),
        1 => {
            let reference = target_reference(state, control)?;
            let lhs = state.read(&reference)?;
            let next = control.at(2).with_acc(Acc::Lvalue {
                reference: reference.clone(),
                lhs: Some(lhs),
            });
            Ok(Reduction::to(enter_expr(operand(control, 1)?, next)).with_effect(Effect::Load(reference)))
        }
        _ => {
            let Acc::Lvalue { reference, lhs: Some(lhs) } = &control.acc else {
                return Err(RuntimeError::invalid(&control.node.kind, "lost the target"));
            };
            let opcode = control.node.attr_str("opcode").unwrap_or_default();
            let op = opcode.strip_suffix("Assign").unwrap_or(&opcode);
            let value = eval_compound(op, lhs, &state.value(control)?)?;
            Ok(Reduction::value(&control.cont, value.clone())
                .with_effect(Effect::Store(reference.clone(), value)))
        }
    }
}

/// `++x`, `x++`, `--x`, `x--`
///
/// Pointers move by one element. The prefix forms yield the new value, the
/// postfix forms the old one.
pub fn step_increment(state: &State, control: &Control) -> StepResult {
    if control.mode == Mode::Type {
        return target_type(state, control);
    }
    if control.index() == 0 {
        let target = operand(control, 0)?;
        return Ok(Reduction::to(enter_expr(target, control.at(1)).with_mode(Mode::Lvalue)));
    }
    let opcode = control.node.attr_str("opcode").unwrap_or_default();
    let reference = target_reference(state, control)?;
    let old = state.read(&reference)?;
    let one = match &old {
        Value::Integral { scalar, .. } => Value::integral(*scalar, 1),
        Value::Floating { scalar, .. } => Value::floating(*scalar, 1.0),
        _ => Value::integral(Scalar::Int, 1),
    };
    let op = if opcode.ends_with("Inc") { "Add" } else { "Sub" };
    let new = eval_binary(op, &old, &one)?;
    let result = if opcode.starts_with("Pre") { new.clone() } else { old };
    Ok(Reduction::value(&control.cont, result)
        .with_effect(Effect::Load(reference.clone()))
        .with_effect(Effect::Store(reference, new)))
}
